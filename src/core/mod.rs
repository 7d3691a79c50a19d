pub mod classify;
pub mod job;
pub mod notifier;
pub mod report;
pub mod runner;
pub mod window;

pub use crate::domain::model::{DateReport, IngestionOutcome, RunSummary};
pub use crate::domain::ports::{ArtifactExporter, ImageSource, Repository, Storage};
pub use crate::utils::error::Result;
