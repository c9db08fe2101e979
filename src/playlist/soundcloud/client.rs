//! SoundCloud set client
//!
//! A set URL is resolved with `/resolve`, then the stub tracks are fetched
//! in batches from `/tracks?ids=`. Share links from the mobile app
//! (`on.soundcloud.com/...`) redirect to the set URL and are followed first.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{adapter, dto};
use crate::playlist::traits::PlaylistSource;
use crate::playlist::{Playlist, PlaylistError};

/// `/tracks?ids=` accepts at most this many ids.
const TRACK_BATCH: usize = 50;

const USER_AGENT: &str = concat!("Quezic/", env!("CARGO_PKG_VERSION"));

static SET_URL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:m\.|www\.)?soundcloud\.com/[^/\s?#]+/sets/[^/\s?#]+").ok()
});

static SHORT_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?:https?://)?on\.soundcloud\.com/\S+$").ok());

fn is_match(re: &LazyLock<Option<Regex>>, url: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(url.trim()))
}

/// Set URLs and app share links.
pub fn is_playlist_url(url: &str) -> bool {
    is_match(&SET_URL, url) || is_match(&SHORT_URL, url)
}

/// Drop the query (`?si=...` share tracking) and fragment.
fn canonical(url: &str) -> String {
    let url = url.trim();
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let url = &url[..end];
    if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// SoundCloud playlist client
pub struct SoundCloudPlaylistClient {
    http_client: reqwest::Client,
    base_url: String,
    client_id: Option<String>,
}

impl SoundCloudPlaylistClient {
    pub fn with_base_url(
        base_url: impl Into<String>,
        client_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PlaylistError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| PlaylistError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.filter(|id| !id.trim().is_empty()),
        })
    }

    fn resolve_url(&self, set_url: &str, client_id: &str) -> String {
        format!(
            "{}/resolve?url={}&client_id={}",
            self.base_url,
            urlencoding::encode(set_url),
            client_id
        )
    }

    fn tracks_url(&self, ids: &[u64], client_id: &str) -> String {
        let ids: Vec<String> = ids.iter().map(u64::to_string).collect();
        format!(
            "{}/tracks?ids={}&client_id={}",
            self.base_url,
            urlencoding::encode(&ids.join(",")),
            client_id
        )
    }

    /// Follow a share link to the set URL it points at.
    async fn expand_short_url(&self, url: &str) -> Result<String, PlaylistError> {
        if !is_match(&SHORT_URL, url) {
            return Ok(canonical(url));
        }
        let response = self
            .http_client
            .head(canonical(url))
            .send()
            .await
            .map_err(|e| PlaylistError::Network(e.to_string()))?;
        let target = canonical(response.url().as_str());
        debug!(target: "playlist::soundcloud", %url, %target, "Expanded share link");
        if is_match(&SET_URL, &target) {
            Ok(target)
        } else {
            Err(PlaylistError::UnsupportedUrl(target))
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T, PlaylistError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| PlaylistError::Network(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            401 | 403 => return Err(PlaylistError::Unauthorized(format!("soundcloud: HTTP {status}"))),
            404 => return Err(PlaylistError::NotFound(what.to_string())),
            _ if !status.is_success() => {
                return Err(PlaylistError::Network(format!(
                    "HTTP {}: {}",
                    status,
                    status.canonical_reason().unwrap_or("Unknown")
                )));
            }
            _ => {}
        }

        response.json().await.map_err(|e| PlaylistError::Parse(e.to_string()))
    }

    /// Complete the stub tracks. A failed batch is logged and its tracks
    /// are left out.
    async fn fetch_stubs(&self, ids: &[u64], client_id: &str) -> Vec<dto::Track> {
        let mut tracks = Vec::with_capacity(ids.len());
        for batch in ids.chunks(TRACK_BATCH) {
            let url = self.tracks_url(batch, client_id);
            match self.get_json::<Vec<dto::Track>>(&url, "tracks").await {
                Ok(found) => tracks.extend(found),
                Err(e) => warn!(target: "playlist::soundcloud", count = batch.len(), "Track batch failed: {}", e),
            }
        }
        tracks
    }
}

#[async_trait]
impl PlaylistSource for SoundCloudPlaylistClient {
    fn name(&self) -> &str {
        "soundcloud"
    }

    fn accepts(&self, url: &str) -> bool {
        is_playlist_url(url)
    }

    async fn fetch(&self, url: &str) -> Result<Playlist, PlaylistError> {
        if !is_playlist_url(url) {
            return Err(PlaylistError::UnsupportedUrl(url.to_string()));
        }
        let client_id = self.client_id.as_deref().ok_or(PlaylistError::MissingClientId)?;
        let set_url = self.expand_short_url(url).await?;

        let set: dto::PlaylistResponse = self
            .get_json(&self.resolve_url(&set_url, client_id), &set_url)
            .await?;
        if set.kind.as_deref().is_some_and(|k| k != "playlist") {
            return Err(PlaylistError::UnsupportedUrl(set_url));
        }

        let stubs = adapter::stub_ids(&set);
        debug!(
            target: "playlist::soundcloud",
            set = set.id,
            tracks = set.tracks.len(),
            stubs = stubs.len(),
            "Resolved set"
        );
        let full = if stubs.is_empty() {
            Vec::new()
        } else {
            self.fetch_stubs(&stubs, client_id).await
        };
        Ok(adapter::to_playlist(set, full))
    }
}
