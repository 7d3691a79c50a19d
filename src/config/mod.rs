pub mod cli;
pub mod job_file;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::classify::ClassificationTable;
use crate::domain::model::ZoneOfInterest;
use crate::utils::error::{FetcherError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_range, validate_required_field,
    validate_url, Validate,
};
use job_file::JobFile;

pub const DEFAULT_WINDOW_DAYS: u32 = 5;
pub const DEFAULT_EE_API_URL: &str = "https://earthengine.googleapis.com/v1";
pub const DEFAULT_EXPORT_FOLDER: &str = "GEE_Soil_Moisture";
pub const DEFAULT_REPORT_DIR: &str = "exports";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Smap,
    Sentinel1,
}

impl DatasetKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "smap" => Ok(DatasetKind::Smap),
            "sentinel1" | "sentinel-1" | "s1" => Ok(DatasetKind::Sentinel1),
            other => Err(FetcherError::InvalidConfigValueError {
                field: "DATASET".to_string(),
                value: other.to_string(),
                reason: "expected smap or sentinel1".to_string(),
            }),
        }
    }

    pub fn defaults(self) -> DatasetConfig {
        match self {
            DatasetKind::Smap => DatasetConfig {
                kind: self,
                collection: "NASA/SMAP/SPL4SMGP/007".to_string(),
                band: "sm_surface".to_string(),
                scale: 10_000.0,
                filters: Vec::new(),
            },
            DatasetKind::Sentinel1 => DatasetConfig {
                kind: self,
                collection: "COPERNICUS/S1_GRD".to_string(),
                band: "VV".to_string(),
                scale: 10.0,
                filters: vec![
                    PropertyFilter::Equals {
                        property: "instrumentMode".to_string(),
                        value: "IW".to_string(),
                    },
                    PropertyFilter::Equals {
                        property: "orbitProperties_pass".to_string(),
                        value: "ASCENDING".to_string(),
                    },
                    PropertyFilter::ListContains {
                        property: "transmitterReceiverPolarisation".to_string(),
                        value: "VV".to_string(),
                    },
                ],
            },
        }
    }

    pub fn classification(self) -> ClassificationTable {
        match self {
            DatasetKind::Smap => ClassificationTable::smap(),
            DatasetKind::Sentinel1 => ClassificationTable::sentinel1(),
        }
    }

    pub fn file_prefix(self) -> &'static str {
        match self {
            DatasetKind::Smap => "smap_soil_moisture",
            DatasetKind::Sentinel1 => "sentinel1_vv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PropertyFilter {
    Equals { property: String, value: String },
    ListContains { property: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub kind: DatasetKind,
    pub collection: String,
    pub band: String,
    /// Nominal pixel size in metres for the regional reduction.
    pub scale: f64,
    pub filters: Vec<PropertyFilter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EarthEngineConfig {
    pub api_url: String,
    pub project: String,
    pub access_token: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    pub enabled: bool,
    pub folder: String,
    pub file_prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            folder: DEFAULT_EXPORT_FOLDER.to_string(),
            file_prefix: DatasetKind::Smap.file_prefix().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookConfig {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub to: Vec<String>,
}

/// Everything the job needs, resolved once at start-up.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub zone: ZoneOfInterest,
    pub window_days: u32,
    pub end_date: Option<NaiveDate>,
    pub dataset: DatasetConfig,
    pub classification: ClassificationTable,
    pub earth_engine: EarthEngineConfig,
    pub export: ExportConfig,
    pub database: DatabaseConfig,
    pub webhook: Option<WebhookConfig>,
    pub email: Option<EmailConfig>,
    pub report_dir: String,
}

impl JobConfig {
    pub fn from_env(job_file: Option<JobFile>) -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), job_file)
    }

    /// Builds the configuration from a key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F, job_file: Option<JobFile>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let file = job_file.unwrap_or_default();

        let zone_name = get("ZONE_NAME")
            .or_else(|| file.zone.as_ref().and_then(|z| z.name.clone()))
            .unwrap_or_else(|| "default".to_string());
        let ring = match get("ZONE_POLYGON") {
            Some(raw) => serde_json::from_str::<Vec<[f64; 2]>>(&raw).map_err(|e| {
                FetcherError::InvalidConfigValueError {
                    field: "ZONE_POLYGON".to_string(),
                    value: raw.clone(),
                    reason: format!("expected a JSON array of [lon, lat] pairs: {}", e),
                }
            })?,
            None => file
                .zone
                .as_ref()
                .map(|z| z.polygon.clone())
                .ok_or_else(|| FetcherError::MissingConfigError {
                    field: "ZONE_POLYGON".to_string(),
                })?,
        };
        let zone = ZoneOfInterest::new(zone_name, ring)?;

        let window_days = match get("WINDOW_DAYS") {
            Some(raw) => parse_number("WINDOW_DAYS", &raw)?,
            None => file.window_days.unwrap_or(DEFAULT_WINDOW_DAYS),
        };

        let file_dataset = file.dataset.clone().unwrap_or_default();
        let kind = match get("DATASET") {
            Some(raw) => DatasetKind::parse(&raw)?,
            None => file_dataset.kind.unwrap_or(DatasetKind::Smap),
        };
        let mut dataset = kind.defaults();
        if let Some(collection) = file_dataset.collection {
            dataset.collection = collection;
        }
        if let Some(band) = file_dataset.band {
            dataset.band = band;
        }
        if let Some(scale) = file_dataset.scale {
            dataset.scale = scale;
        }
        if let Some(filters) = file_dataset.filters {
            dataset.filters = filters;
        }

        let classification = match file.classification {
            Some(table) => table,
            None => kind.classification(),
        };

        let earth_engine = EarthEngineConfig {
            api_url: get("EE_API_URL").unwrap_or_else(|| DEFAULT_EE_API_URL.to_string()),
            project: required(&get, "EE_PROJECT")?,
            access_token: required(&get, "EE_ACCESS_TOKEN")?,
            timeout_seconds: match get("EE_TIMEOUT_SECONDS") {
                Some(raw) => parse_number("EE_TIMEOUT_SECONDS", &raw)?,
                None => 60,
            },
        };

        let export = ExportConfig {
            enabled: match get("EXPORT_ENABLED") {
                Some(raw) => parse_bool("EXPORT_ENABLED", &raw)?,
                None => true,
            },
            folder: get("GDRIVE_FOLDER").unwrap_or_else(|| DEFAULT_EXPORT_FOLDER.to_string()),
            file_prefix: get("EXPORT_PREFIX").unwrap_or_else(|| kind.file_prefix().to_string()),
        };

        let database = DatabaseConfig {
            host: required(&get, "DB_HOST")?,
            port: match get("DB_PORT") {
                Some(raw) => parse_number("DB_PORT", &raw)?,
                None => 5432,
            },
            name: required(&get, "DB_NAME")?,
            user: required(&get, "DB_USER")?,
            password: required(&get, "DB_PASS")?,
        };

        let webhook = get("WEBHOOK_URL").map(|url| WebhookConfig { url });

        let email = match get("SMTP_HOST") {
            None => None,
            Some(smtp_host) => Some(EmailConfig {
                smtp_host,
                smtp_port: match get("SMTP_PORT") {
                    Some(raw) => parse_number("SMTP_PORT", &raw)?,
                    None => 587,
                },
                username: get("SMTP_USER"),
                password: get("SMTP_PASS"),
                from: required(&get, "EMAIL_FROM")?,
                to: required(&get, "EMAIL_TO")?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            }),
        };

        let report_dir = get("REPORT_DIR").unwrap_or_else(|| DEFAULT_REPORT_DIR.to_string());

        Ok(Self {
            zone,
            window_days,
            end_date: None,
            dataset,
            classification,
            earth_engine,
            export,
            database,
            webhook,
            email,
            report_dir,
        })
    }
}

impl Validate for JobConfig {
    fn validate(&self) -> Result<()> {
        validate_range("WINDOW_DAYS", self.window_days, 1, 366)?;
        validate_url("EE_API_URL", &self.earth_engine.api_url)?;
        validate_non_empty_string("dataset.collection", &self.dataset.collection)?;
        validate_non_empty_string("dataset.band", &self.dataset.band)?;
        if !(self.dataset.scale.is_finite() && self.dataset.scale > 0.0) {
            return Err(FetcherError::InvalidConfigValueError {
                field: "dataset.scale".to_string(),
                value: self.dataset.scale.to_string(),
                reason: "scale must be a positive number of metres".to_string(),
            });
        }
        validate_path("REPORT_DIR", &self.report_dir)?;
        if let Some(webhook) = &self.webhook {
            validate_url("WEBHOOK_URL", &webhook.url)?;
        }
        if let Some(email) = &self.email {
            if email.to.is_empty() {
                return Err(FetcherError::InvalidConfigValueError {
                    field: "EMAIL_TO".to_string(),
                    value: String::new(),
                    reason: "at least one recipient is required".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn required<G>(get: &G, key: &str) -> Result<String>
where
    G: Fn(&str) -> Option<String>,
{
    validate_required_field(key, &get(key)).cloned()
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| FetcherError::InvalidConfigValueError {
            field: field.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

fn parse_bool(field: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(FetcherError::InvalidConfigValueError {
            field: field.to_string(),
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
