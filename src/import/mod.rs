// # Import pipeline
//
// Normalizes heterogeneous reading-tracker exports into a durable work
// queue (ImportStore), then drains that queue asynchronously, reconciling
// each record into the catalog without destroying user-curated data:
// - ingest: file parsing into Saved import records
// - store: bulk queue primitives keyed by (status, owner)
// - worker: orchestration, crash-resume, the drain loop
// - merge: additive candidate/catalog reconciliation
// - history: reading-event reconstruction from noisy export data

pub mod history;
pub mod ingest;
pub mod merge;
pub mod store;
pub mod throttle;
pub mod types;
pub mod worker;

use thiserror::Error;

pub use ingest::ImportIngestor;
pub use store::{ImportStore, DEFAULT_PAGE_SIZE};
pub use throttle::{ImportThrottle, NoThrottle, RandomThrottle};
pub use types::{ImportConfig, ParsedRow};
pub use worker::{ImportHandle, ImportSummary, ImportWorker};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Library error: {0}")]
    Library(#[from] crate::library::LibraryError),
    #[error("Import task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
