//! SoundCloud API v2 Data Transfer Objects
//!
//! These types match EXACTLY what api-v2.soundcloud.com returns.
//! DO NOT use these types outside the soundcloud module - convert to domain types.

use serde::Deserialize;

/// A track, from `/resolve`, `/tracks/{id}` or a search collection
#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    pub id: u64,
    pub title: Option<String>,
    /// Milliseconds
    pub duration: Option<u64>,
    pub permalink_url: Option<String>,
    pub artwork_url: Option<String>,
    pub user: Option<User>,
    pub media: Option<Media>,
    /// "ALLOW", "MONETIZE", "SNIP" (preview only), "BLOCK"
    pub policy: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Media {
    #[serde(default)]
    pub transcodings: Vec<Transcoding>,
}

/// One encoding; `url` must be requested again to obtain the media URL
#[derive(Debug, Clone, Deserialize)]
pub struct Transcoding {
    pub url: String,
    /// e.g. "mp3_0_1", "opus_0_0", "aac_160k"
    pub preset: Option<String>,
    pub format: TranscodingFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscodingFormat {
    /// "progressive" or "hls"
    pub protocol: String,
    pub mime_type: String,
}

/// Response of a transcoding URL
#[derive(Debug, Clone, Deserialize)]
pub struct MediaUrl {
    pub url: String,
}

/// `/search/tracks`
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub collection: Vec<Track>,
}
