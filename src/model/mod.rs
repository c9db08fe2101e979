//! Core data models shared by every subsystem.
//!
//! Defines the primary entities: [`Track`], its stable [`TrackId`], and the
//! [`SourceDescriptor`] that names where a track can be fetched from.
//!
//! # Database Schema
//!
//! Tracks map to the `tracks` table. The pair
//! `(provider_kind, provider_track_id)` is unique, so the same origin is
//! never catalogued twice.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable, catalog-assigned track identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TrackId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// External platform a track originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Video platform reached through relay frontends
    YouTube,
    /// Audio platform reached through its own API
    SoundCloud,
    /// Imported from the device, no remote origin
    Local,
}

impl ProviderKind {
    /// Storage/CLI name of the provider.
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::YouTube => "youtube",
            ProviderKind::SoundCloud => "soundcloud",
            ProviderKind::Local => "local",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "youtube" | "yt" => Ok(ProviderKind::YouTube),
            "soundcloud" | "sc" => Ok(ProviderKind::SoundCloud),
            "local" => Ok(ProviderKind::Local),
            other => Err(format!("unknown provider kind: {other}")),
        }
    }
}

/// Where a track can be fetched from: provider plus provider-native id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub kind: ProviderKind,
    /// Provider-native identifier (video id, permalink, numeric id)
    pub track_id: String,
    /// Canonical page URL, when known
    pub origin_url: Option<String>,
}

impl SourceDescriptor {
    pub fn new(kind: ProviderKind, track_id: impl Into<String>) -> Self {
        Self {
            kind,
            track_id: track_id.into(),
            origin_url: None,
        }
    }

    pub fn with_origin(mut self, url: impl Into<String>) -> Self {
        self.origin_url = Some(url.into());
        self
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.track_id)
    }
}

/// A track in the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    /// Duration in seconds, 0 when unknown
    pub duration_secs: u32,
    pub thumbnail_url: Option<String>,
    /// Downloaded copy on this device
    pub local_content: Option<PathBuf>,
    pub source: SourceDescriptor,
    pub genre: Option<String>,
    pub created_at: DateTime<Utc>,
    pub play_count: u32,
    pub last_played_at: Option<DateTime<Utc>>,
    pub favorite: bool,
}

impl Track {
    /// Build a new, never-played track with a fresh id.
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        duration_secs: u32,
        source: SourceDescriptor,
    ) -> Self {
        Self {
            id: TrackId::generate(),
            title: title.into(),
            artist: artist.into(),
            album: None,
            duration_secs,
            thumbnail_url: None,
            local_content: None,
            source,
            genre: None,
            created_at: Utc::now(),
            play_count: 0,
            last_played_at: None,
            favorite: false,
        }
    }

    /// Whether a local copy exists (downloaded or imported).
    pub fn is_downloaded(&self) -> bool {
        self.local_content.is_some()
    }

    /// Duration if known.
    pub fn known_duration(&self) -> Option<u32> {
        (self.duration_secs > 0).then_some(self.duration_secs)
    }

    /// "Artist - Title" for logs and file names.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}
