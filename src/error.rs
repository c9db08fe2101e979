//! Application-wide error types.
//!
//! Library modules use specific error types via `thiserror`, while
//! CLI/main uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level error enum, one variant per subsystem
//! - Subsystem errors (e.g. [`DownloadError`], [`ResolutionError`]) for
//!   detailed handling close to the source
//! - All errors implement `std::error::Error` for compatibility
//!
//! # Example
//!
//! ```ignore
//! use quezic::error::{Result, ResultExt};
//!
//! async fn open(path: &Path) -> Result<Services> {
//!     let pool = init_db(&db_url(Some(path))).await.with_context("opening catalog")?;
//!     Ok(Services::new(pool))
//! }
//! ```

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::download::{DownloadError, FetchError, StorageError};
use crate::extraction::ResolutionError;
use crate::matcher::MatchError;
use crate::player::{EngineError, PlaybackError};
use crate::playlist::PlaylistError;
use crate::recommend::RecommendError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
///
/// Aggregates errors from all subsystems for unified handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Every provider, instance and route failed
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Match error: {0}")]
    Match(#[from] MatchError),

    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Audio engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Recommendation error: {0}")]
    Recommend(#[from] RecommendError),

    #[error("Playlist error: {0}")]
    Playlist(#[from] PlaylistError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context layers.
    pub fn root(&self) -> &Error {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(ctx))
    }
}
