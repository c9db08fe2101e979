//! SoundCloud HTTP client
//!
//! Direct provider: a single API host, a client id is required on every
//! request. Resolution is two requests: the track, then the chosen
//! transcoding's media URL.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{adapter, dto};
use crate::extraction::domain::{
    Instance, ProviderResult, ResolutionError, ResolvedStream, Route, StreamPreferences,
};
use crate::extraction::traits::ProviderClient;
use crate::extraction::transport::HttpTransport;

pub const DEFAULT_API_URL: &str = "https://api-v2.soundcloud.com";

/// SoundCloud API client
pub struct SoundCloudClient {
    transport: Arc<HttpTransport>,
    api: Instance,
    client_id: Option<String>,
}

impl SoundCloudClient {
    pub fn new(transport: Arc<HttpTransport>, api_url: &str, client_id: Option<String>) -> Self {
        Self {
            transport,
            api: Instance::new(api_url),
            client_id: client_id.filter(|id| !id.is_empty()),
        }
    }

    fn client_id(&self) -> Result<&str, ResolutionError> {
        self.client_id
            .as_deref()
            .ok_or_else(|| ResolutionError::Unauthorized("soundcloud: no client id configured".into()))
    }

    fn track_url(&self, instance: &Instance, track_id: &str, client_id: &str) -> String {
        if track_id.chars().all(|c| c.is_ascii_digit()) {
            format!("{}/tracks/{}?client_id={}", instance.base_url, track_id, client_id)
        } else {
            format!(
                "{}/resolve?url={}&client_id={}",
                instance.base_url,
                urlencoding::encode(track_id),
                client_id
            )
        }
    }
}

#[async_trait]
impl ProviderClient for SoundCloudClient {
    fn name(&self) -> &str {
        "soundcloud"
    }

    fn instances(&self) -> Vec<Instance> {
        vec![self.api.clone()]
    }

    async fn fetch_stream(
        &self,
        instance: &Instance,
        route: &Route,
        track_id: &str,
        preferences: StreamPreferences,
    ) -> Result<ResolvedStream, ResolutionError> {
        let client_id = self.client_id()?;
        debug!(target: "extraction::soundcloud", %route, %track_id, "Resolving track");

        let url = self.track_url(instance, track_id, client_id);
        let track: dto::Track = self.transport.get_json(route, &url, "soundcloud").await?;
        let mut option = adapter::pick_transcoding(&track, preferences)?;

        let separator = if option.url.contains('?') { '&' } else { '?' };
        let media_url = format!("{}{}client_id={}", option.url, separator, client_id);
        let media: dto::MediaUrl = self.transport.get_json(route, &media_url, "soundcloud").await?;
        option.url = media.url;

        Ok(ResolvedStream::from_option(option, "soundcloud"))
    }

    async fn search(
        &self,
        instance: &Instance,
        route: &Route,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ProviderResult>, ResolutionError> {
        let client_id = self.client_id()?;
        let url = format!(
            "{}/search/tracks?q={}&limit={}&client_id={}",
            instance.base_url,
            urlencoding::encode(query),
            limit,
            client_id
        );
        let response: dto::SearchResponse = self.transport.get_json(route, &url, "soundcloud").await?;
        Ok(response
            .collection
            .into_iter()
            .take(limit)
            .map(adapter::to_result)
            .collect())
    }
}
