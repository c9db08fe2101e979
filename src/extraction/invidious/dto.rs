//! Invidious API Data Transfer Objects
//!
//! These types match EXACTLY what an Invidious instance returns.
//! DO NOT use these types outside the invidious module - convert to domain types.
//!
//! API Reference: https://docs.invidious.io/api/

use serde::Deserialize;

/// `GET /api/v1/videos/{videoId}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResponse {
    pub title: Option<String>,
    pub author: Option<String>,
    pub length_seconds: Option<i64>,
    #[serde(default)]
    pub adaptive_formats: Vec<AdaptiveFormat>,
    pub hls_url: Option<String>,
    /// Present instead of the fields above on failure
    pub error: Option<String>,
}

/// Adaptive (split audio/video) format
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveFormat {
    pub url: String,
    /// MIME type with codecs, e.g. `audio/mp4; codecs="mp4a.40.2"`
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Bits per second; instances serialize it as string or number
    pub bitrate: Option<serde_json::Value>,
    pub audio_quality: Option<String>,
}

/// One entry of `GET /api/v1/search?q=...&type=video`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    #[serde(rename = "type")]
    pub item_type: String,
    pub title: Option<String>,
    pub video_id: Option<String>,
    pub author: Option<String>,
    pub length_seconds: Option<i64>,
    #[serde(default)]
    pub video_thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    pub quality: Option<String>,
    pub url: String,
}
