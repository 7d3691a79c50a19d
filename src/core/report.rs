use serde::Serialize;

use crate::domain::model::{OutcomeKind, RunSummary};
use crate::utils::error::{FetcherError, Result};

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    date: String,
    outcome: OutcomeKind,
    value: Option<f64>,
    label: Option<&'a str>,
}

pub fn report_file_name(summary: &RunSummary) -> String {
    format!("soil_moisture_{}_{}.csv", summary.start, summary.end)
}

/// One row per processed date, in processing order.
pub fn render_csv(summary: &RunSummary) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for report in &summary.dates {
        writer.serialize(ReportRow {
            date: report.date.format("%Y-%m-%d").to_string(),
            outcome: report.outcome,
            value: report.value,
            label: report.label.as_deref(),
        })?;
    }

    // 無資料時仍輸出表頭
    if summary.dates.is_empty() {
        writer.write_record(["date", "outcome", "value", "label"])?;
    }

    writer
        .into_inner()
        .map_err(|e| FetcherError::IoError(e.into_error()))
}
