use chrono::NaiveDate;

use crate::core::notifier::Notifier;
use crate::core::window::DateWindow;
use crate::domain::model::{
    Acquisition, DateReport, FailureReason, IngestionOutcome, InsertResult, MoistureRecord,
    RunSummary, ZoneOfInterest,
};
use crate::domain::ports::{ArtifactExporter, ImageSource, Repository};
use crate::utils::error::{FetcherError, Result};

/// Walks a date window oldest-first, fetching and storing each missing day.
///
/// Every date is handled on its own: a failure becomes that date's outcome
/// and the loop moves on to the next date.
pub struct IngestionRunner<I: ImageSource, R: Repository, X: ArtifactExporter> {
    source: I,
    repository: R,
    exporter: X,
    notifier: Notifier,
}

/// Whether a date would be fetched by a real run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDate {
    pub date: NaiveDate,
    pub already_present: bool,
}

impl<I: ImageSource, R: Repository, X: ArtifactExporter> IngestionRunner<I, R, X> {
    pub fn new(source: I, repository: R, exporter: X, notifier: Notifier) -> Self {
        Self {
            source,
            repository,
            exporter,
            notifier,
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub async fn run(&self, window: &DateWindow, zone: &ZoneOfInterest) -> RunSummary {
        let mut summary = RunSummary::new(zone.name(), window.start, window.end);

        tracing::info!(
            zone = zone.name(),
            start = %window.start,
            end = %window.end,
            days = window.day_count(),
            "starting ingestion"
        );

        for date in window.dates() {
            let outcome = match self.process_date(date, zone).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(%date, error = %e, transient = e.is_transient(), "date failed");
                    IngestionOutcome::Failed(FailureReason::from(&e))
                }
            };

            let report = DateReport::new(zone.name(), date, &outcome);
            log_outcome(&report);
            self.notifier.notify(&report).await;
            summary.record(report);
        }

        tracing::info!(
            inserted = summary.inserted,
            already_present = summary.already_present,
            no_data_available = summary.no_data_available,
            failed = summary.failed,
            "ingestion finished"
        );

        summary
    }

    /// Lists the window's dates with their stored state, touching nothing else.
    pub async fn plan(&self, window: &DateWindow) -> Result<Vec<PlannedDate>> {
        let mut planned = Vec::with_capacity(window.day_count());
        for date in window.dates() {
            planned.push(PlannedDate {
                date,
                already_present: self.repository.exists(date).await?,
            });
        }
        Ok(planned)
    }

    async fn process_date(&self, date: NaiveDate, zone: &ZoneOfInterest) -> Result<IngestionOutcome> {
        if self.repository.exists(date).await? {
            return Ok(IngestionOutcome::AlreadyPresent);
        }

        let reading = match self.source.query(date, zone).await? {
            Acquisition::NoData => return Ok(IngestionOutcome::NoDataAvailable),
            Acquisition::Reading(reading) => reading,
        };

        if !reading.value.is_finite() {
            return Err(FetcherError::MalformedDataError {
                message: format!("non-finite aggregate {} for {}", reading.value, date),
            });
        }

        let record = MoistureRecord::from_reading(date, &reading);
        match self.repository.insert_if_absent(&record).await? {
            InsertResult::AlreadyPresent => {
                tracing::info!(%date, "record stored by a concurrent run");
                Ok(IngestionOutcome::AlreadyPresent)
            }
            InsertResult::Inserted => {
                match self.exporter.export_async(date, zone).await {
                    Ok(handle) => {
                        tracing::info!(%date, operation = %handle.operation, "export started")
                    }
                    Err(e) => tracing::warn!(%date, error = %e, "export request failed"),
                }
                Ok(IngestionOutcome::Inserted(reading))
            }
        }
    }
}

fn log_outcome(report: &DateReport) {
    match (&report.value, &report.reason) {
        (Some(value), _) => tracing::info!(
            date = %report.date,
            outcome = %report.outcome,
            value,
            label = report.label.as_deref().unwrap_or_default(),
            "date processed"
        ),
        (None, Some(reason)) => {
            tracing::warn!(date = %report.date, outcome = %report.outcome, reason = %reason, "date processed")
        }
        (None, None) => tracing::info!(date = %report.date, outcome = %report.outcome, "date processed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryRepository;
    use crate::domain::model::{ExportHandle, OutcomeKind, Reading};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedSource {
        script: HashMap<NaiveDate, Result<Acquisition>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new() -> Self {
            Self {
                script: HashMap::new(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn reading(mut self, date: NaiveDate, value: f64) -> Self {
            self.script.insert(
                date,
                Ok(Acquisition::Reading(Reading {
                    value,
                    label: "label".to_string(),
                })),
            );
            self
        }

        fn failing(mut self, date: NaiveDate) -> Self {
            self.script.insert(
                date,
                Err(FetcherError::TransientSourceError {
                    message: "rate limited".to_string(),
                }),
            );
            self
        }
    }

    #[async_trait::async_trait]
    impl ImageSource for ScriptedSource {
        async fn verify(&self, _zone: &ZoneOfInterest) -> Result<()> {
            Ok(())
        }

        async fn query(&self, date: NaiveDate, _zone: &ZoneOfInterest) -> Result<Acquisition> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.get(&date) {
                Some(Ok(acquisition)) => Ok(acquisition.clone()),
                Some(Err(e)) => Err(FetcherError::TransientSourceError {
                    message: e.to_string(),
                }),
                None => Ok(Acquisition::NoData),
            }
        }
    }

    struct FailingExporter;

    #[async_trait::async_trait]
    impl ArtifactExporter for FailingExporter {
        async fn export_async(&self, _date: NaiveDate, _zone: &ZoneOfInterest) -> Result<ExportHandle> {
            Err(FetcherError::ExportError {
                message: "quota exceeded".to_string(),
            })
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn zone() -> ZoneOfInterest {
        ZoneOfInterest::new(
            "field",
            vec![[-2.34, 35.10], [-2.33, 35.10], [-2.33, 35.12], [-2.34, 35.10]],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_failed_date_does_not_stop_the_loop() {
        let source = ScriptedSource::new().failing(date(1)).reading(date(2), 0.21);
        let runner = IngestionRunner::new(
            source,
            InMemoryRepository::new(),
            FailingExporter,
            Notifier::empty(),
        );
        let window = DateWindow::new(date(1), date(2)).unwrap();

        let summary = runner.run(&window, &zone()).await;

        assert_eq!(summary.dates[0].outcome, OutcomeKind::Failed);
        assert_eq!(summary.dates[1].outcome, OutcomeKind::Inserted);
        assert_eq!(summary.exit_code(), 2);
        assert!(runner.repository().get(date(2)).is_some());
    }

    #[tokio::test]
    async fn test_export_failure_keeps_inserted_outcome() {
        let source = ScriptedSource::new().reading(date(3), 0.08);
        let runner = IngestionRunner::new(
            source,
            InMemoryRepository::new(),
            FailingExporter,
            Notifier::empty(),
        );
        let window = DateWindow::new(date(3), date(3)).unwrap();

        let summary = runner.run(&window, &zone()).await;

        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_non_finite_value_is_malformed() {
        let source = ScriptedSource::new().reading(date(4), f64::NAN);
        let runner = IngestionRunner::new(
            source,
            InMemoryRepository::new(),
            FailingExporter,
            Notifier::empty(),
        );
        let window = DateWindow::new(date(4), date(4)).unwrap();

        let summary = runner.run(&window, &zone()).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(
            summary.dates[0].failure,
            Some(crate::domain::model::FailureKind::MalformedData)
        );
        assert!(runner.repository().get(date(4)).is_none());
        assert_eq!(summary.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_plan_does_not_query_source() {
        let source = ScriptedSource::new().reading(date(5), 0.1);
        let calls = source.calls.clone();
        let repository = InMemoryRepository::new();
        repository
            .insert_if_absent(&MoistureRecord::from_reading(
                date(5),
                &Reading {
                    value: 0.1,
                    label: "label".to_string(),
                },
            ))
            .await
            .unwrap();
        let runner = IngestionRunner::new(source, repository, FailingExporter, Notifier::empty());
        let window = DateWindow::new(date(5), date(6)).unwrap();

        let planned = runner.plan(&window).await.unwrap();

        assert_eq!(
            planned,
            vec![
                PlannedDate {
                    date: date(5),
                    already_present: true
                },
                PlannedDate {
                    date: date(6),
                    already_present: false
                },
            ]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
