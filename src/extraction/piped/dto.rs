//! Piped API Data Transfer Objects
//!
//! These types match EXACTLY what a Piped instance returns.
//! DO NOT use these types outside the piped module - convert to domain types.
//!
//! API Reference: https://docs.piped.video/docs/api-documentation/

use serde::Deserialize;

/// `GET /streams/{videoId}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamsResponse {
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub thumbnail_url: Option<String>,
    /// Seconds
    pub duration: Option<i64>,
    /// Master HLS playlist
    pub hls: Option<String>,
    #[serde(default)]
    pub audio_streams: Vec<AudioStream>,
    /// Set instead of the fields above when extraction failed upstream
    pub error: Option<String>,
    pub message: Option<String>,
}

/// One audio-only stream
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStream {
    pub url: String,
    /// "M4A", "WEBMA_OPUS", ...
    pub format: Option<String>,
    pub mime_type: Option<String>,
    pub codec: Option<String>,
    /// Bits per second
    pub bitrate: Option<u64>,
    #[serde(default)]
    pub video_only: bool,
}

/// `GET /search?q=...&filter=videos`
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    /// Relative watch path, `/watch?v=...`
    pub url: String,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub uploader_name: Option<String>,
    /// Seconds, -1 for live streams
    pub duration: Option<i64>,
}
