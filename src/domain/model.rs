use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::error::{FetcherError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_polygon};

/// Monitored polygon. Coordinates are `[lon, lat]` pairs forming a closed ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneOfInterest {
    name: String,
    ring: Vec<[f64; 2]>,
}

impl ZoneOfInterest {
    pub fn new(name: impl Into<String>, ring: Vec<[f64; 2]>) -> Result<Self> {
        let name = name.into();
        validate_non_empty_string("ZONE_NAME", &name)?;
        validate_polygon("ZONE_POLYGON", &ring)?;
        Ok(Self { name, ring })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ring(&self) -> &[[f64; 2]] {
        &self.ring
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoistureRecord {
    pub date: NaiveDate,
    pub value: Option<f64>,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

impl MoistureRecord {
    pub fn from_reading(date: NaiveDate, reading: &Reading) -> Self {
        Self {
            date,
            value: Some(reading.value),
            label: reading.label.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Spatial mean over the zone for one day, with its moisture class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition {
    Reading(Reading),
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    Inserted,
    AlreadyPresent,
}

/// Accepted export request; the platform completes it out of band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportHandle {
    pub operation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    TransientSource,
    PermanentSource,
    Persistence,
    MalformedData,
    /// Errors that are not expected inside the per-date loop.
    Internal,
}

impl FailureKind {
    pub fn from_error(err: &FetcherError) -> Self {
        match err {
            FetcherError::TransientSourceError { .. } => FailureKind::TransientSource,
            FetcherError::PermanentSourceError { .. } => FailureKind::PermanentSource,
            FetcherError::PersistenceError(_) | FetcherError::StoreError { .. } => {
                FailureKind::Persistence
            }
            FetcherError::MalformedDataError { .. }
            | FetcherError::SerializationError(_)
            | FetcherError::CsvError(_) => FailureKind::MalformedData,
            FetcherError::InitializationError { .. }
            | FetcherError::ConfigError { .. }
            | FetcherError::MissingConfigError { .. }
            | FetcherError::InvalidConfigValueError { .. }
            | FetcherError::ExportError { .. }
            | FetcherError::NotificationSinkError { .. }
            | FetcherError::IoError(_) => FailureKind::Internal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&FetcherError> for FailureReason {
    fn from(err: &FetcherError) -> Self {
        Self {
            kind: FailureKind::from_error(err),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestionOutcome {
    Inserted(Reading),
    AlreadyPresent,
    NoDataAvailable,
    Failed(FailureReason),
}

impl IngestionOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            IngestionOutcome::Inserted(_) => OutcomeKind::Inserted,
            IngestionOutcome::AlreadyPresent => OutcomeKind::AlreadyPresent,
            IngestionOutcome::NoDataAvailable => OutcomeKind::NoDataAvailable,
            IngestionOutcome::Failed(_) => OutcomeKind::Failed,
        }
    }

    pub fn reading(&self) -> Option<&Reading> {
        match self {
            IngestionOutcome::Inserted(reading) => Some(reading),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Inserted,
    AlreadyPresent,
    NoDataAvailable,
    Failed,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeKind::Inserted => "inserted",
            OutcomeKind::AlreadyPresent => "already_present",
            OutcomeKind::NoDataAvailable => "no_data_available",
            OutcomeKind::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Outcome of one date, in the shape delivered to sinks and written to the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateReport {
    pub zone: String,
    pub date: NaiveDate,
    pub outcome: OutcomeKind,
    pub value: Option<f64>,
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

impl DateReport {
    pub fn new(zone: &str, date: NaiveDate, outcome: &IngestionOutcome) -> Self {
        let (reason, failure) = match outcome {
            IngestionOutcome::Failed(reason) => (Some(reason.message.clone()), Some(reason.kind)),
            _ => (None, None),
        };
        Self {
            zone: zone.to_string(),
            date,
            outcome: outcome.kind(),
            value: outcome.reading().map(|r| r.value),
            label: outcome.reading().map(|r| r.label.clone()),
            reason,
            failure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub zone: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub inserted: usize,
    pub already_present: usize,
    pub no_data_available: usize,
    pub failed: usize,
    pub dates: Vec<DateReport>,
}

impl RunSummary {
    pub fn new(zone: &str, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            zone: zone.to_string(),
            start,
            end,
            inserted: 0,
            already_present: 0,
            no_data_available: 0,
            failed: 0,
            dates: Vec::new(),
        }
    }

    pub fn record(&mut self, report: DateReport) {
        match report.outcome {
            OutcomeKind::Inserted => self.inserted += 1,
            OutcomeKind::AlreadyPresent => self.already_present += 1,
            OutcomeKind::NoDataAvailable => self.no_data_available += 1,
            OutcomeKind::Failed => self.failed += 1,
        }
        self.dates.push(report);
    }

    pub fn count(&self, kind: OutcomeKind) -> usize {
        match kind {
            OutcomeKind::Inserted => self.inserted,
            OutcomeKind::AlreadyPresent => self.already_present,
            OutcomeKind::NoDataAvailable => self.no_data_available,
            OutcomeKind::Failed => self.failed,
        }
    }

    /// 0 without failures, 2 when every failure is worth a retry, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.failed == 0 {
            return 0;
        }
        let all_transient = self
            .dates
            .iter()
            .filter_map(|d| d.failure)
            .all(|kind| kind == FailureKind::TransientSource);
        if all_transient {
            2
        } else {
            1
        }
    }
}
