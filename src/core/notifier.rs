//! Fans events out to every configured sink.
//!
//! Each sink is attempted independently; a failing sink is logged and
//! reported back but never stops the others or changes a date's outcome.

use std::time::Instant;

use crate::domain::model::DateReport;
use crate::domain::ports::{NotificationSink, SummaryNotice};

/// Result of delivering one event to one sink.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryResult {
    pub sink: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Default)]
pub struct Notifier {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl Notifier {
    pub fn new(sinks: Vec<Box<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.sink_name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub async fn notify(&self, report: &DateReport) -> Vec<DeliveryResult> {
        let mut results = Vec::with_capacity(self.sinks.len());
        for sink in &self.sinks {
            let start = Instant::now();
            let result = sink.send_date(report).await;
            results.push(record_delivery(
                sink.as_ref(),
                result,
                start,
                &report.date.to_string(),
            ));
        }
        results
    }

    pub async fn notify_summary(&self, notice: &SummaryNotice<'_>) -> Vec<DeliveryResult> {
        let mut results = Vec::with_capacity(self.sinks.len());
        for sink in &self.sinks {
            let start = Instant::now();
            let result = sink.send_summary(notice).await;
            results.push(record_delivery(sink.as_ref(), result, start, "summary"));
        }
        results
    }
}

fn record_delivery(
    sink: &dyn NotificationSink,
    result: crate::utils::error::Result<()>,
    start: Instant,
    event: &str,
) -> DeliveryResult {
    let duration_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(()) => {
            tracing::debug!(sink = sink.sink_name(), event, duration_ms, "notification delivered");
            DeliveryResult {
                sink: sink.sink_name().to_string(),
                success: true,
                error: None,
                duration_ms,
            }
        }
        Err(e) => {
            tracing::warn!(
                sink = sink.sink_name(),
                event,
                error = %e,
                duration_ms,
                "notification delivery failed"
            );
            DeliveryResult {
                sink: sink.sink_name().to_string(),
                success: false,
                error: Some(e.to_string()),
                duration_ms,
            }
        }
    }
}
