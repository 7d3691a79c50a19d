use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetcherError {
    #[error("Initialization failed: {message}")]
    InitializationError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Image source temporarily unavailable: {message}")]
    TransientSourceError { message: String },

    #[error("Image source rejected the request: {message}")]
    PermanentSourceError { message: String },

    #[error("Malformed data: {message}")]
    MalformedDataError { message: String },

    #[error("Database error: {0}")]
    PersistenceError(#[from] sqlx::Error),

    #[error("Record store error: {message}")]
    StoreError { message: String },

    #[error("Export request failed: {message}")]
    ExportError { message: String },

    #[error("Notification via {sink} failed: {message}")]
    NotificationSinkError { sink: String, message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Initialization,
    Source,
    Persistence,
    Export,
    Notification,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FetcherError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            FetcherError::ConfigError { .. }
            | FetcherError::MissingConfigError { .. }
            | FetcherError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            FetcherError::InitializationError { .. } => ErrorCategory::Initialization,
            FetcherError::TransientSourceError { .. }
            | FetcherError::PermanentSourceError { .. }
            | FetcherError::MalformedDataError { .. } => ErrorCategory::Source,
            FetcherError::PersistenceError(_) | FetcherError::StoreError { .. } => {
                ErrorCategory::Persistence
            }
            FetcherError::ExportError { .. } => ErrorCategory::Export,
            FetcherError::NotificationSinkError { .. } => ErrorCategory::Notification,
            FetcherError::CsvError(_)
            | FetcherError::IoError(_)
            | FetcherError::SerializationError(_) => ErrorCategory::Io,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            FetcherError::ExportError { .. } | FetcherError::NotificationSinkError { .. } => {
                ErrorSeverity::Low
            }
            FetcherError::TransientSourceError { .. } => ErrorSeverity::Medium,
            FetcherError::PermanentSourceError { .. }
            | FetcherError::MalformedDataError { .. }
            | FetcherError::PersistenceError(_)
            | FetcherError::StoreError { .. }
            | FetcherError::CsvError(_)
            | FetcherError::IoError(_)
            | FetcherError::SerializationError(_) => ErrorSeverity::High,
            FetcherError::InitializationError { .. }
            | FetcherError::ConfigError { .. }
            | FetcherError::MissingConfigError { .. }
            | FetcherError::InvalidConfigValueError { .. } => ErrorSeverity::Critical,
        }
    }

    /// Retrying the same date later can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetcherError::TransientSourceError { .. } => true,
            FetcherError::PersistenceError(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            FetcherError::MissingConfigError { .. } => {
                "Set the missing variable in the environment or the .env file"
            }
            FetcherError::InvalidConfigValueError { .. } | FetcherError::ConfigError { .. } => {
                "Check the configuration values and the job file syntax"
            }
            FetcherError::InitializationError { .. } => {
                "Check the Earth Engine token/project and the database connection parameters"
            }
            FetcherError::TransientSourceError { .. } => {
                "Re-run the job later; dates already stored will be skipped"
            }
            FetcherError::PermanentSourceError { .. } => {
                "Check credentials and the zone polygon; retrying will not help"
            }
            FetcherError::MalformedDataError { .. } => {
                "Inspect the dataset band and scale configured for this zone"
            }
            FetcherError::PersistenceError(_) | FetcherError::StoreError { .. } => {
                "Check that the database is reachable and writable"
            }
            FetcherError::ExportError { .. } => "Check the export folder and Earth Engine quota",
            FetcherError::NotificationSinkError { .. } => {
                "Check the webhook URL or SMTP settings"
            }
            FetcherError::CsvError(_) | FetcherError::IoError(_) => {
                "Check that the report directory exists and is writable"
            }
            FetcherError::SerializationError(_) => "Report this as a bug",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Initialization => format!("Could not start the job: {}", self),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FetcherError>;
