//! Shared-playlist sources.
//!
//! Turns a playlist URL into [`ImportRow`]s for the
//! [`PlaylistImporter`](crate::matcher::PlaylistImporter).
//!
//! # Architecture
//!
//! - **traits.rs**: [`PlaylistSource`] seam, one per service
//! - **spotify/**: public playlists via the embed page (no OAuth)
//! - **soundcloud/**: sets via API v2 `/resolve`
//! - [`PlaylistFetcher`] picks the source that accepts a URL

pub mod soundcloud;
pub mod spotify;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::Config;
use crate::matcher::ImportRow;

pub use soundcloud::SoundCloudPlaylistClient;
pub use spotify::SpotifyEmbedClient;
pub use traits::PlaylistSource;

/// Artist used when a service gives none.
pub(crate) const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// A fetched playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    /// Service-native id
    pub id: String,
    pub name: String,
    pub owner: Option<String>,
    pub rows: Vec<ImportRow>,
}

/// Errors from playlist sources
#[derive(Debug, thiserror::Error)]
pub enum PlaylistError {
    #[error("Not a supported playlist URL: {0}")]
    UnsupportedUrl(String),

    #[error("No SoundCloud client id configured (credentials.soundcloud_client_id)")]
    MissingClientId,

    #[error("Access denied: {0}")]
    Unauthorized(String),

    #[error("Playlist not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Playlist has no tracks (is it public?): {0}")]
    Empty(String),
}

/// Dispatches a URL to the first source that accepts it.
pub struct PlaylistFetcher {
    sources: Vec<Arc<dyn PlaylistSource>>,
}

impl PlaylistFetcher {
    pub fn new(sources: Vec<Arc<dyn PlaylistSource>>) -> Self {
        Self { sources }
    }

    /// Spotify and SoundCloud sources, sharing the network attempt timeout.
    pub fn from_config(config: &Config) -> Result<Self, PlaylistError> {
        let timeout = Duration::from_secs(config.network.attempt_timeout_secs);
        let spotify = SpotifyEmbedClient::new(timeout)?;
        let soundcloud = SoundCloudPlaylistClient::with_base_url(
            &config.providers.soundcloud_api_url,
            config.credentials.soundcloud_client_id.clone(),
            timeout,
        )?;
        let sources: Vec<Arc<dyn PlaylistSource>> = vec![Arc::new(spotify), Arc::new(soundcloud)];
        Ok(Self::new(sources))
    }

    /// Whether some source recognizes `url`.
    pub fn supports(&self, url: &str) -> bool {
        self.source_for(url).is_some()
    }

    fn source_for(&self, url: &str) -> Option<&Arc<dyn PlaylistSource>> {
        self.sources.iter().find(|s| s.accepts(url.trim()))
    }

    /// Fetch a playlist. A playlist without any usable track is an error.
    pub async fn fetch(&self, url: &str) -> Result<Playlist, PlaylistError> {
        let url = url.trim();
        let source = self
            .source_for(url)
            .ok_or_else(|| PlaylistError::UnsupportedUrl(url.to_string()))?;

        let playlist = source.fetch(url).await?;
        if playlist.rows.is_empty() {
            return Err(PlaylistError::Empty(playlist.name));
        }
        info!(
            target: "playlist",
            source = source.name(),
            name = %playlist.name,
            tracks = playlist.rows.len(),
            "Fetched playlist"
        );
        Ok(playlist)
    }
}

#[cfg(test)]
mod tests {
    use super::traits::mocks::MockPlaylistSource;
    use super::*;

    fn row(title: &str) -> ImportRow {
        ImportRow {
            title: title.to_string(),
            artist: "Artist".to_string(),
            album: None,
            duration_ms: Some(200_000),
        }
    }

    fn playlist(rows: Vec<ImportRow>) -> Playlist {
        Playlist {
            id: "p1".to_string(),
            name: "Mix".to_string(),
            owner: None,
            rows,
        }
    }

    #[tokio::test]
    async fn test_dispatches_to_accepting_source() {
        let spotify = Arc::new(MockPlaylistSource::new("open.spotify.com", playlist(vec![row("A")])));
        let soundcloud = Arc::new(MockPlaylistSource::new("soundcloud.com", playlist(vec![row("B")])));
        let sources: Vec<Arc<dyn PlaylistSource>> = vec![spotify.clone(), soundcloud.clone()];
        let fetcher = PlaylistFetcher::new(sources);

        let result = fetcher
            .fetch("  https://soundcloud.com/user/sets/mix ")
            .await
            .unwrap();
        assert_eq!(result.rows[0].title, "B");
        assert!(spotify.fetched().is_empty());
        assert_eq!(soundcloud.fetched(), vec!["https://soundcloud.com/user/sets/mix".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_url_and_local_paths_are_unsupported() {
        let fetcher = PlaylistFetcher::new(vec![Arc::new(MockPlaylistSource::new(
            "open.spotify.com",
            playlist(vec![row("A")]),
        ))]);
        assert!(!fetcher.supports("playlist.json"));
        assert!(matches!(
            fetcher.fetch("https://example.com/list").await,
            Err(PlaylistError::UnsupportedUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_playlist_is_an_error() {
        let fetcher = PlaylistFetcher::new(vec![Arc::new(MockPlaylistSource::new(
            "open.spotify.com",
            playlist(Vec::new()),
        ))]);
        let err = fetcher
            .fetch("https://open.spotify.com/playlist/abc")
            .await
            .unwrap_err();
        assert!(matches!(err, PlaylistError::Empty(name) if name == "Mix"));
    }

    #[test]
    fn test_from_config_recognizes_both_services() {
        let fetcher = PlaylistFetcher::from_config(&Config::default()).unwrap();
        assert!(fetcher.supports("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M?si=x"));
        assert!(fetcher.supports("spotify:playlist:37i9dQZF1DXcBWIGoYBM5M"));
        assert!(fetcher.supports("https://soundcloud.com/artist/sets/summer-mix"));
        assert!(fetcher.supports("https://on.soundcloud.com/AbCdEf"));
        assert!(!fetcher.supports("https://soundcloud.com/artist/track-name"));
        assert!(!fetcher.supports("rows.json"));
    }
}
