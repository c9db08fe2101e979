//! Download orchestration: durable, retried acquisition of track audio.
//!
//! # Architecture
//!
//! - **task.rs**: Task records, statuses and events
//! - **store.rs**: Durable task table (SQLite) and an in-memory twin
//! - **backoff.rs**: Retry delays
//! - **fetch.rs**: Byte transfer from resolved URLs
//! - **storage.rs**: Scoped local files
//! - **orchestrator.rs**: Workers, retry policy and bookkeeping

mod backoff;
pub mod fetch;
mod orchestrator;
pub mod storage;
mod store;
mod task;

pub use backoff::BackoffPolicy;
pub use fetch::{ByteSource, FetchError, HttpByteSource};
pub use orchestrator::{DownloadDeps, DownloadOrchestrator, DownloadSettings};
pub use storage::{FsStorage, LocalStorage, StorageError};
pub use store::{MemoryTaskStore, SqliteTaskStore, TaskStore};
pub use task::{DownloadErrorKind, DownloadEvent, DownloadStatus, DownloadTask};

use crate::catalog::CatalogError;
use crate::model::TrackId;

/// Errors from download bookkeeping.
///
/// Failures of individual attempts are not errors here: they are recorded
/// on the task as a [`DownloadErrorKind`].
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// A non-terminal task already exists; nothing was changed
    #[error("Download already in progress for {0}")]
    AlreadyInProgress(TrackId),

    #[error("Track not in catalog: {0}")]
    TrackNotFound(TrackId),

    #[error("No download task for {0}")]
    NoTask(TrackId),

    #[error("Download for {0} is {1} and cannot be resumed")]
    NotResumable(TrackId, DownloadStatus),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt task row for {track_id}: {message}")]
    Corrupt { track_id: String, message: String },
}

impl DownloadError {
    /// `AlreadyInProgress` is an idempotent no-op for callers.
    pub fn is_already_in_progress(&self) -> bool {
        matches!(self, Self::AlreadyInProgress(_))
    }
}
