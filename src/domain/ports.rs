use crate::domain::model::{
    Acquisition, DateReport, ExportHandle, InsertResult, MoistureRecord, RunSummary,
    ZoneOfInterest,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Destination for run artifacts; returns where the file ended up.
pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

/// Remote catalog that reduces a day of imagery over a zone to one value.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Cheap round trip proving credentials and region are usable.
    async fn verify(&self, zone: &ZoneOfInterest) -> Result<()>;

    async fn query(&self, date: NaiveDate, zone: &ZoneOfInterest) -> Result<Acquisition>;
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn ensure_schema(&self) -> Result<()>;

    async fn exists(&self, date: NaiveDate) -> Result<bool>;

    /// Single conditional write; never a check-then-act pair.
    async fn insert_if_absent(&self, record: &MoistureRecord) -> Result<InsertResult>;
}

#[async_trait]
pub trait ArtifactExporter: Send + Sync {
    async fn export_async(&self, date: NaiveDate, zone: &ZoneOfInterest) -> Result<ExportHandle>;
}

/// A summary notification with the rendered CSV report.
#[derive(Debug, Clone)]
pub struct SummaryNotice<'a> {
    pub summary: &'a RunSummary,
    pub report_name: &'a str,
    pub report_csv: &'a [u8],
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_date(&self, report: &DateReport) -> Result<()>;

    async fn send_summary(&self, notice: &SummaryNotice<'_>) -> Result<()>;

    fn sink_name(&self) -> &str;
}
