//! Spotify embed page client
//!
//! Public playlists render without OAuth at
//! `open.spotify.com/embed/playlist/{id}`; the page carries the playlist as
//! JSON. Private playlists come back as a page without tracks.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::adapter;
use crate::playlist::traits::PlaylistSource;
use crate::playlist::{Playlist, PlaylistError};

pub const DEFAULT_EMBED_URL: &str = "https://open.spotify.com/embed/playlist";

/// The embed page is only served in full to browsers.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

static PLAYLIST_ID: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?:spotify\.com/(?:embed/)?playlist/|^spotify:playlist:)([A-Za-z0-9]+)").ok()
});

/// Playlist id from a share URL or a `spotify:playlist:` URI.
pub fn playlist_id(url: &str) -> Option<String> {
    PLAYLIST_ID
        .as_ref()?
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Spotify embed client
pub struct SpotifyEmbedClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl SpotifyEmbedClient {
    pub fn new(timeout: Duration) -> Result<Self, PlaylistError> {
        Self::with_base_url(DEFAULT_EMBED_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PlaylistError> {
        let http_client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| PlaylistError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn embed_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url, id)
    }

    async fn fetch_embed(&self, id: &str) -> Result<String, PlaylistError> {
        let response = self
            .http_client
            .get(self.embed_url(id))
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| PlaylistError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PlaylistError::NotFound(id.to_string()));
        }
        if !status.is_success() {
            return Err(PlaylistError::Network(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .text()
            .await
            .map_err(|e| PlaylistError::Network(e.to_string()))
    }
}

#[async_trait]
impl PlaylistSource for SpotifyEmbedClient {
    fn name(&self) -> &str {
        "spotify"
    }

    fn accepts(&self, url: &str) -> bool {
        playlist_id(url).is_some()
    }

    async fn fetch(&self, url: &str) -> Result<Playlist, PlaylistError> {
        let id = playlist_id(url).ok_or_else(|| PlaylistError::UnsupportedUrl(url.to_string()))?;
        let html = self.fetch_embed(&id).await?;
        debug!(target: "playlist::spotify", %id, bytes = html.len(), "Fetched embed page");
        adapter::parse_embed(&html, &id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_id_forms() {
        let id = Some("37i9dQZF1DXcBWIGoYBM5M".to_string());
        assert_eq!(playlist_id("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M?si=4f2a"), id);
        assert_eq!(playlist_id("https://open.spotify.com/embed/playlist/37i9dQZF1DXcBWIGoYBM5M"), id);
        assert_eq!(playlist_id("spotify:playlist:37i9dQZF1DXcBWIGoYBM5M"), id);
        assert_eq!(playlist_id("https://open.spotify.com/album/4aawyAB9vmqN3uQ7FjRGTy"), None);
        assert_eq!(playlist_id("playlist.json"), None);
    }

    #[test]
    fn test_embed_url() {
        let client = SpotifyEmbedClient::with_base_url("http://localhost:9/embed/playlist/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.embed_url("abc"), "http://localhost:9/embed/playlist/abc");
    }

    #[tokio::test]
    async fn test_non_playlist_url_fails_without_request() {
        let client = SpotifyEmbedClient::new(Duration::from_secs(1)).unwrap();
        let err = client
            .fetch("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC")
            .await
            .unwrap_err();
        assert!(matches!(err, PlaylistError::UnsupportedUrl(_)));
    }
}
