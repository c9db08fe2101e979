//! Last.fm HTTP client
//!
//! Only `artist.getsimilar` is used.
//! See: https://www.last.fm/api/show/artist.getSimilar
//!
//! IMPORTANT: every call needs an API key; the free tier allows about
//! five requests per second.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{adapter, dto};
use crate::recommend::RecommendError;
use crate::recommend::traits::SimilarArtists;

pub const DEFAULT_API_URL: &str = "https://ws.audioscrobbler.com/2.0";

const USER_AGENT: &str = concat!("Quezic/", env!("CARGO_PKG_VERSION"));

/// Last.fm API client
pub struct LastFmClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl LastFmClient {
    /// Create a client; without a key every lookup fails with
    /// [`RecommendError::MissingApiKey`].
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, RecommendError> {
        Self::with_base_url(DEFAULT_API_URL, api_key, timeout)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RecommendError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| RecommendError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    fn similar_url(&self, api_key: &str, artist: &str, limit: usize) -> String {
        format!(
            "{}/?method=artist.getsimilar&artist={}&api_key={}&format=json&autocorrect=1&limit={}",
            self.base_url,
            urlencoding::encode(artist),
            api_key,
            limit
        )
    }

    /// Send the request and parse either the payload or Last.fm's error body
    async fn send_similar_request(
        &self,
        artist: &str,
        limit: usize,
    ) -> Result<dto::SimilarArtistsResponse, RecommendError> {
        let api_key = self.api_key.as_deref().ok_or(RecommendError::MissingApiKey)?;
        let url = self.similar_url(api_key, artist, limit);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| RecommendError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RecommendError::RateLimited);
        }

        let body = response
            .text()
            .await
            .map_err(|e| RecommendError::Network(e.to_string()))?;
        parse_body(status, &body)
    }
}

fn parse_body(status: reqwest::StatusCode, body: &str) -> Result<dto::SimilarArtistsResponse, RecommendError> {
    if let Ok(error) = serde_json::from_str::<dto::ApiError>(body) {
        return Err(match error.error {
            dto::ERROR_RATE_LIMITED => RecommendError::RateLimited,
            dto::ERROR_INVALID_API_KEY => RecommendError::MissingApiKey,
            dto::ERROR_NOT_FOUND => RecommendError::UnknownArtist(error.message),
            code => RecommendError::Api { code, message: error.message },
        });
    }

    if !status.is_success() {
        return Err(RecommendError::Network(format!(
            "HTTP {}: {}",
            status,
            status.canonical_reason().unwrap_or("Unknown")
        )));
    }

    serde_json::from_str(body).map_err(|e| RecommendError::Parse(e.to_string()))
}

#[async_trait]
impl SimilarArtists for LastFmClient {
    async fn similar_artists(&self, artist: &str, limit: usize) -> Result<Vec<String>, RecommendError> {
        let response = self.send_similar_request(artist, limit).await?;
        let names = adapter::to_artist_names(response);
        debug!(target: "recommend::lastfm", %artist, found = names.len(), "Similar artists");
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn client(key: Option<&str>) -> LastFmClient {
        LastFmClient::new(key.map(String::from), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = client(Some("k"));
        assert_eq!(client.base_url, "https://ws.audioscrobbler.com/2.0");
    }

    #[test]
    fn test_similar_url_encodes_artist() {
        let client = client(Some("k"));
        assert_eq!(
            client.similar_url("k", "Simon & Garfunkel", 5),
            "https://ws.audioscrobbler.com/2.0/?method=artist.getsimilar&artist=Simon%20%26%20Garfunkel&api_key=k&format=json&autocorrect=1&limit=5"
        );
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let client = client(Some("   "));
        let err = client.similar_artists("Björk", 5).await.unwrap_err();
        assert!(matches!(err, RecommendError::MissingApiKey));
    }

    #[test]
    fn test_error_body_mapping() {
        let body = r#"{"error": 29, "message": "Rate Limit Exceeded"}"#;
        assert!(matches!(parse_body(StatusCode::OK, body), Err(RecommendError::RateLimited)));

        let body = r#"{"error": 6, "message": "The artist you supplied could not be found"}"#;
        assert!(matches!(
            parse_body(StatusCode::OK, body),
            Err(RecommendError::UnknownArtist(_))
        ));

        let body = r#"{"error": 11, "message": "Service Offline"}"#;
        assert!(matches!(
            parse_body(StatusCode::SERVICE_UNAVAILABLE, body),
            Err(RecommendError::Api { code: 11, .. })
        ));
    }

    #[test]
    fn test_non_json_failure_is_network_error() {
        let err = parse_body(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, RecommendError::Network(msg) if msg.contains("502")));
    }

    #[test]
    fn test_success_body_parses() {
        let body = r#"{"similarartists": {"artist": [{"name": "Air", "match": "0.8"}]}}"#;
        let response = parse_body(StatusCode::OK, body).unwrap();
        assert_eq!(response.similarartists.artist[0].name, "Air");
    }
}
