//! Piped HTTP client
//!
//! Piped is a relay frontend for YouTube. Many public instances exist and
//! any of them may be down, so the client only performs single attempts;
//! the resolver walks the instance list.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{adapter, dto};
use crate::extraction::domain::{
    Instance, ProviderResult, ResolutionError, ResolvedStream, Route, StreamPreferences,
};
use crate::extraction::ids::youtube_video_id;
use crate::extraction::traits::ProviderClient;
use crate::extraction::transport::HttpTransport;

/// Default public instances, in priority order.
pub const DEFAULT_INSTANCES: &[&str] = &[
    "https://pipedapi.kavin.rocks",
    "https://pipedapi.leptons.xyz",
    "https://pipedapi.nosebs.ru",
    "https://pipedapi-libre.kavin.rocks",
    "https://piped-api.privacy.com.de",
    "https://pipedapi.reallyaweso.me",
    "https://api.piped.private.coffee",
    "https://piped-api.codespace.cz",
];

/// Piped API client
pub struct PipedClient {
    transport: Arc<HttpTransport>,
    instances: Vec<Instance>,
}

impl PipedClient {
    pub fn new(transport: Arc<HttpTransport>, instances: &[String]) -> Self {
        Self {
            transport,
            instances: instances.iter().map(Instance::new).collect(),
        }
    }

    /// Create a client against the default instance list
    pub fn with_defaults(transport: Arc<HttpTransport>) -> Self {
        let instances: Vec<String> = DEFAULT_INSTANCES.iter().map(|s| s.to_string()).collect();
        Self::new(transport, &instances)
    }
}

#[async_trait]
impl ProviderClient for PipedClient {
    fn name(&self) -> &str {
        "piped"
    }

    fn instances(&self) -> Vec<Instance> {
        self.instances.clone()
    }

    async fn fetch_stream(
        &self,
        instance: &Instance,
        route: &Route,
        track_id: &str,
        preferences: StreamPreferences,
    ) -> Result<ResolvedStream, ResolutionError> {
        let video_id = youtube_video_id(track_id)
            .ok_or_else(|| ResolutionError::ContentNotFound(format!("not a video id: {track_id}")))?;
        let url = format!("{}/streams/{}", instance.base_url, video_id);
        debug!(target: "extraction::piped", host = instance.host(), %route, %video_id, "Fetching streams");

        let response: dto::StreamsResponse = self.transport.get_json(route, &url, "piped").await?;
        adapter::to_stream(response, &video_id, preferences)
    }

    async fn search(
        &self,
        instance: &Instance,
        route: &Route,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ProviderResult>, ResolutionError> {
        let url = format!(
            "{}/search?q={}&filter=videos",
            instance.base_url,
            urlencoding::encode(query)
        );
        let response: dto::SearchResponse = self.transport.get_json(route, &url, "piped").await?;
        let mut results = adapter::to_results(response);
        results.truncate(limit);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_instances_in_order() {
        let transport = Arc::new(HttpTransport::new(Duration::from_secs(5), None).unwrap());
        let client = PipedClient::with_defaults(transport);
        let instances = client.instances();
        assert_eq!(instances.len(), DEFAULT_INSTANCES.len());
        assert_eq!(instances[0].base_url, "https://pipedapi.kavin.rocks");
    }

    #[tokio::test]
    async fn test_invalid_id_is_not_found_without_request() {
        let transport = Arc::new(HttpTransport::new(Duration::from_secs(5), None).unwrap());
        let client = PipedClient::new(transport, &["http://127.0.0.1:9".to_string()]);
        let instance = client.instances().remove(0);
        let err = client
            .fetch_stream(&instance, &Route::Direct, "nope", StreamPreferences::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::ContentNotFound(_)));
    }
}
