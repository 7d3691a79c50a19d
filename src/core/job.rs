use crate::core::report::{render_csv, report_file_name};
use crate::core::runner::IngestionRunner;
use crate::core::window::DateWindow;
use crate::domain::model::{RunSummary, ZoneOfInterest};
use crate::domain::ports::{ArtifactExporter, ImageSource, Repository, Storage, SummaryNotice};

/// What a finished run leaves behind.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub summary: RunSummary,
    /// `None` when the report could not be rendered or written.
    pub report_path: Option<String>,
}

/// Runs the ingestion loop, then writes the CSV report and sends the summary.
pub struct DailyJob<I, R, X, S>
where
    I: ImageSource,
    R: Repository,
    X: ArtifactExporter,
    S: Storage,
{
    runner: IngestionRunner<I, R, X>,
    storage: S,
}

impl<I, R, X, S> DailyJob<I, R, X, S>
where
    I: ImageSource,
    R: Repository,
    X: ArtifactExporter,
    S: Storage,
{
    pub fn new(runner: IngestionRunner<I, R, X>, storage: S) -> Self {
        Self { runner, storage }
    }

    pub fn runner(&self) -> &IngestionRunner<I, R, X> {
        &self.runner
    }

    pub async fn run(&self, window: &DateWindow, zone: &ZoneOfInterest) -> JobResult {
        let summary = self.runner.run(window, zone).await;
        let report_name = report_file_name(&summary);

        let report_csv = match render_csv(&summary) {
            Ok(csv) => csv,
            Err(e) => {
                tracing::error!(error = %e, "failed to render run report");
                Vec::new()
            }
        };

        let report_path = if report_csv.is_empty() {
            None
        } else {
            match self.storage.write_file(&report_name, &report_csv).await {
                Ok(path) => {
                    tracing::info!(path = %path, "run report written");
                    Some(path)
                }
                Err(e) => {
                    tracing::error!(error = %e, report = %report_name, "failed to write run report");
                    None
                }
            }
        };

        let notice = SummaryNotice {
            summary: &summary,
            report_name: &report_name,
            report_csv: &report_csv,
        };
        let deliveries = self.runner.notifier().notify_summary(&notice).await;
        let delivered = deliveries.iter().filter(|d| d.success).count();
        if !deliveries.is_empty() {
            tracing::info!(delivered, sinks = deliveries.len(), "summary sent");
        }

        JobResult {
            summary,
            report_path,
        }
    }
}
