//! JSON webhook sink.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use crate::config::WebhookConfig;
use crate::domain::model::DateReport;
use crate::domain::ports::{NotificationSink, SummaryNotice};
use crate::utils::error::{FetcherError, Result};

#[derive(Debug, Clone)]
pub struct WebhookSink {
    url: String,
    client: Client,
}

impl WebhookSink {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FetcherError::InitializationError {
                message: format!("cannot build webhook client: {}", e),
            })?;
        Ok(Self {
            url: config.url.clone(),
            client,
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, payload: &T) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(self.error(format!("webhook returned {}: {}", status, body)));
        }

        tracing::debug!(url = %self.url, %status, "webhook delivered");
        Ok(())
    }

    fn error(&self, message: String) -> FetcherError {
        FetcherError::NotificationSinkError {
            sink: self.sink_name().to_string(),
            message,
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn send_date(&self, report: &DateReport) -> Result<()> {
        self.post(report).await
    }

    async fn send_summary(&self, notice: &SummaryNotice<'_>) -> Result<()> {
        self.post(&json!({
            "event": "run_summary",
            "report": notice.report_name,
            "summary": notice.summary,
        }))
        .await
    }

    fn sink_name(&self) -> &str {
        "webhook"
    }
}
