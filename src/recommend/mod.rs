//! Recommendations from similar artists.
//!
//! # Architecture
//!
//! - **traits.rs**: [`SimilarArtists`] seam (the external similarity service)
//! - **lastfm/**: Last.fm implementation (`client.rs`, `dto.rs`, `adapter.rs`)
//! - **service.rs**: [`Recommender`], which turns similar artists into
//!   provider search hits through [`ProviderSearch`]
//!
//! [`ProviderSearch`]: crate::extraction::ProviderSearch

pub mod lastfm;
mod service;
pub mod traits;

pub use lastfm::LastFmClient;
pub use service::{Recommendation, Recommender, RecommenderConfig};
pub use traits::SimilarArtists;

use crate::extraction::ResolutionError;

/// Errors from recommendation lookups
#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error("No Last.fm API key configured (credentials.lastfm_api_key)")]
    MissingApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited - try again later")]
    RateLimited,

    #[error("Unknown artist: {0}")]
    UnknownArtist(String),

    #[error("API error {code}: {message}")]
    Api { code: u32, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Provider search failed: {0}")]
    Search(#[from] ResolutionError),
}
