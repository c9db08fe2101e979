//! Last.fm API Data Transfer Objects
//!
//! These types match EXACTLY what ws.audioscrobbler.com/2.0 returns with
//! `format=json`. DO NOT use these types outside the lastfm module.

use serde::Deserialize;

/// `artist.getsimilar`
#[derive(Debug, Clone, Deserialize)]
pub struct SimilarArtistsResponse {
    pub similarartists: SimilarArtists,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimilarArtists {
    #[serde(default)]
    pub artist: Vec<Artist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Artist {
    pub name: String,
    /// Similarity in [0,1], sent as a string ("0.873512")
    #[serde(rename = "match", default)]
    pub match_score: Option<String>,
    pub mbid: Option<String>,
    pub url: Option<String>,
}

/// Error body; Last.fm sends it with 200 as well as 4xx statuses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub error: u32,
    pub message: String,
}

/// Error codes we react to.
pub const ERROR_INVALID_API_KEY: u32 = 10;
pub const ERROR_NOT_FOUND: u32 = 6;
pub const ERROR_RATE_LIMITED: u32 = 29;
