//! Trait seam for the similar-artist service.

use async_trait::async_trait;

use super::RecommendError;

/// Looks up artists similar to a seed artist.
#[async_trait]
pub trait SimilarArtists: Send + Sync {
    /// Up to `limit` artist names, most similar first.
    async fn similar_artists(&self, artist: &str, limit: usize) -> Result<Vec<String>, RecommendError>;
}
