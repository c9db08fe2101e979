//! Invidious HTTP client
//!
//! Second relay frontend for YouTube, tried after Piped by default.

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
    "https://inv.nadeko.net",
    "https://invidious.protokolla.fi",
    "https://iv.nbohr.dk",
    "https://invidious.lunar.icu",
];

/// Invidious API client
pub struct InvidiousClient {
    transport: Arc<HttpTransport>,
    instances: Vec<Instance>,
}

impl InvidiousClient {
    pub fn new(transport: Arc<HttpTransport>, instances: &[String]) -> Self {
        Self {
            transport,
            instances: instances.iter().map(Instance::new).collect(),
        }
    }
}

#[async_trait]
impl ProviderClient for InvidiousClient {
    fn name(&self) -> &str {
        "invidious"
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
        let url = format!("{}/api/v1/videos/{}", instance.base_url, video_id);
        debug!(target: "extraction::invidious", host = instance.host(), %route, %video_id, "Fetching video");

        let response: dto::VideoResponse = self.transport.get_json(route, &url, "invidious").await?;
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
            "{}/api/v1/search?q={}&type=video",
            instance.base_url,
            urlencoding::encode(query)
        );
        let items: Vec<dto::SearchItem> = self.transport.get_json(route, &url, "invidious").await?;
        let mut results = adapter::to_results(items);
        results.truncate(limit);
        Ok(results)
    }
}
