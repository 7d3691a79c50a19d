#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use soil_fetcher::adapters::memory::InMemoryRepository;
use soil_fetcher::domain::model::{
    Acquisition, DateReport, ExportHandle, InsertResult, MoistureRecord, Reading, ZoneOfInterest,
};
use soil_fetcher::domain::ports::{
    ArtifactExporter, ImageSource, NotificationSink, Repository, SummaryNotice,
};
use soil_fetcher::{ClassificationTable, FetcherError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
}

pub fn zone() -> ZoneOfInterest {
    ZoneOfInterest::new(
        "test-field",
        vec![
            [-2.3481773965156094, 35.10994069768071],
            [-2.3456620930114127, 35.1057921166766],
            [-2.3395766814241767, 35.10280500753562],
            [-2.3481773965156094, 35.10994069768071],
        ],
    )
    .unwrap()
}

pub fn stored(day: u32, value: f64, label: &str) -> MoistureRecord {
    MoistureRecord::from_reading(
        date(day),
        &Reading {
            value,
            label: label.to_string(),
        },
    )
}

#[derive(Debug, Clone, Copy)]
pub enum ScriptedFailure {
    Transient,
    Permanent,
}

/// Image source answering from a fixed script; unscripted dates have no imagery.
#[derive(Clone)]
pub struct StubSource {
    table: ClassificationTable,
    values: HashMap<NaiveDate, f64>,
    failures: HashMap<NaiveDate, ScriptedFailure>,
    pub queried: Arc<Mutex<Vec<NaiveDate>>>,
}

impl StubSource {
    pub fn new(table: ClassificationTable) -> Self {
        Self {
            table,
            values: HashMap::new(),
            failures: HashMap::new(),
            queried: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn value(mut self, day: NaiveDate, value: f64) -> Self {
        self.values.insert(day, value);
        self
    }

    pub fn failure(mut self, day: NaiveDate, failure: ScriptedFailure) -> Self {
        self.failures.insert(day, failure);
        self
    }

    pub fn queried_dates(&self) -> Vec<NaiveDate> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageSource for StubSource {
    async fn verify(&self, _zone: &ZoneOfInterest) -> Result<()> {
        Ok(())
    }

    async fn query(&self, date: NaiveDate, _zone: &ZoneOfInterest) -> Result<Acquisition> {
        self.queried.lock().unwrap().push(date);
        match self.failures.get(&date) {
            Some(ScriptedFailure::Transient) => {
                return Err(FetcherError::TransientSourceError {
                    message: "service unavailable".to_string(),
                })
            }
            Some(ScriptedFailure::Permanent) => {
                return Err(FetcherError::PermanentSourceError {
                    message: "collection not found".to_string(),
                })
            }
            None => {}
        }
        Ok(match self.values.get(&date) {
            Some(&value) => Acquisition::Reading(Reading {
                value,
                label: self.table.classify(value).to_string(),
            }),
            None => Acquisition::NoData,
        })
    }
}

#[derive(Clone, Default)]
pub struct RecordingExporter {
    pub exported: Arc<Mutex<Vec<NaiveDate>>>,
}

#[async_trait]
impl ArtifactExporter for RecordingExporter {
    async fn export_async(&self, date: NaiveDate, _zone: &ZoneOfInterest) -> Result<ExportHandle> {
        self.exported.lock().unwrap().push(date);
        Ok(ExportHandle {
            operation: format!("operations/{}", date),
        })
    }
}

/// Sink that keeps every event it receives and can be told to fail.
#[derive(Clone)]
pub struct RecordingSink {
    name: String,
    fail: bool,
    pub dates: Arc<Mutex<Vec<DateReport>>>,
    pub summaries: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl RecordingSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: false,
            dates: Arc::new(Mutex::new(Vec::new())),
            summaries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send_date(&self, report: &DateReport) -> Result<()> {
        self.dates.lock().unwrap().push(report.clone());
        if self.fail {
            return Err(FetcherError::NotificationSinkError {
                sink: self.name.clone(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    async fn send_summary(&self, notice: &SummaryNotice<'_>) -> Result<()> {
        self.summaries
            .lock()
            .unwrap()
            .push((notice.report_name.to_string(), notice.report_csv.to_vec()));
        if self.fail {
            return Err(FetcherError::NotificationSinkError {
                sink: self.name.clone(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    fn sink_name(&self) -> &str {
        &self.name
    }
}

/// In-memory store whose lookups fail for one date, as an unreachable database would.
#[derive(Clone, Default)]
pub struct FlakyRepository {
    pub inner: InMemoryRepository,
    broken: Option<NaiveDate>,
}

impl FlakyRepository {
    pub fn failing_on(day: NaiveDate) -> Self {
        Self {
            inner: InMemoryRepository::new(),
            broken: Some(day),
        }
    }
}

#[async_trait]
impl Repository for FlakyRepository {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn exists(&self, date: NaiveDate) -> Result<bool> {
        if self.broken == Some(date) {
            return Err(FetcherError::StoreError {
                message: "connection reset".to_string(),
            });
        }
        self.inner.exists(date).await
    }

    async fn insert_if_absent(&self, record: &MoistureRecord) -> Result<InsertResult> {
        self.inner.insert_if_absent(record).await
    }
}
