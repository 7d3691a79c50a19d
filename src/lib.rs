pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::storage::LocalStorage;
pub use config::{cli::Cli, JobConfig};
pub use core::{
    classify::ClassificationTable, job::DailyJob, notifier::Notifier, runner::IngestionRunner,
    window::DateWindow,
};
pub use utils::error::{FetcherError, Result};
