//! Download task records and the events they emit.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extraction::{ResolutionError, ResolutionErrorKind};
use crate::model::TrackId;

/// Lifecycle of a download task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Queued,
    Running,
    Retrying,
    Succeeded,
    Failed,
}

impl DownloadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "retrying" => Ok(Self::Retrying),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown download status: {other}")),
        }
    }
}

/// Why the last attempt failed. Recorded on the task for user visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadErrorKind {
    ProviderUnavailable,
    ContentNotFound,
    RateLimited,
    Unauthorized,
    StorageFailure,
    Cancelled,
    /// The track vanished from the catalog
    TrackNotFound,
}

impl DownloadErrorKind {
    /// Failures that retrying cannot fix.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::ContentNotFound | Self::TrackNotFound)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProviderUnavailable => "provider_unavailable",
            Self::ContentNotFound => "content_not_found",
            Self::RateLimited => "rate_limited",
            Self::Unauthorized => "unauthorized",
            Self::StorageFailure => "storage_failure",
            Self::Cancelled => "cancelled",
            Self::TrackNotFound => "track_not_found",
        }
    }
}

impl fmt::Display for DownloadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provider_unavailable" => Ok(Self::ProviderUnavailable),
            "content_not_found" => Ok(Self::ContentNotFound),
            "rate_limited" => Ok(Self::RateLimited),
            "unauthorized" => Ok(Self::Unauthorized),
            "storage_failure" => Ok(Self::StorageFailure),
            "cancelled" => Ok(Self::Cancelled),
            "track_not_found" => Ok(Self::TrackNotFound),
            other => Err(format!("unknown download error kind: {other}")),
        }
    }
}

impl From<ResolutionErrorKind> for DownloadErrorKind {
    fn from(kind: ResolutionErrorKind) -> Self {
        match kind {
            ResolutionErrorKind::ContentNotFound => Self::ContentNotFound,
            ResolutionErrorKind::RateLimited => Self::RateLimited,
            ResolutionErrorKind::Unauthorized => Self::Unauthorized,
            // A kind with no provider chain never becomes playable by waiting
            ResolutionErrorKind::UnsupportedProvider => Self::ContentNotFound,
            ResolutionErrorKind::ProviderUnavailable => Self::ProviderUnavailable,
        }
    }
}

impl From<&ResolutionError> for DownloadErrorKind {
    fn from(e: &ResolutionError) -> Self {
        e.kind().into()
    }
}

/// One queued acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadTask {
    pub track_id: TrackId,
    pub status: DownloadStatus,
    /// Attempts started so far
    pub attempts: u32,
    pub last_error: Option<DownloadErrorKind>,
    pub enqueued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When a `Retrying` task becomes due
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl DownloadTask {
    pub fn new(track_id: TrackId) -> Self {
        let now = Utc::now();
        Self {
            track_id,
            status: DownloadStatus::Queued,
            attempts: 0,
            last_error: None,
            enqueued_at: now,
            updated_at: now,
            next_attempt_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `status`, touching `updated_at`.
    pub(crate) fn transition(&mut self, status: DownloadStatus) {
        self.status = status;
        self.updated_at = Utc::now();
        if status != DownloadStatus::Retrying {
            self.next_attempt_at = None;
        }
    }
}

/// Observable download state change.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    Status {
        track_id: TrackId,
        status: DownloadStatus,
        attempts: u32,
        error: Option<DownloadErrorKind>,
    },
    Progress {
        track_id: TrackId,
        bytes: u64,
        total: Option<u64>,
    },
}

impl DownloadEvent {
    pub fn status(task: &DownloadTask) -> Self {
        Self::Status {
            track_id: task.track_id.clone(),
            status: task.status,
            attempts: task.attempts,
            error: task.last_error,
        }
    }

    pub fn track_id(&self) -> &TrackId {
        match self {
            Self::Status { track_id, .. } | Self::Progress { track_id, .. } => track_id,
        }
    }
}
