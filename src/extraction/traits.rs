//! Trait seams for provider clients and stream resolution.
//!
//! The player and downloader depend on [`StreamResolver`]; the matcher and
//! recommender depend on [`ProviderSearch`]. Production code wires in the
//! [`ExtractionResolver`](super::ExtractionResolver), tests substitute mocks.

use async_trait::async_trait;

use super::domain::{
    Instance, ProviderResult, ResolutionError, ResolutionRequest, ResolvedStream, Route,
    StreamPreferences,
};
use crate::model::ProviderKind;

/// A single provider backend (one relay frontend, or a direct API).
///
/// Each method performs one attempt against one instance over one route;
/// fallback across instances and routes is the resolver's job.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Short backend name for logs ("piped", "invidious", ...).
    fn name(&self) -> &str;

    /// Priority-ordered instances.
    fn instances(&self) -> Vec<Instance>;

    /// Resolve a provider-native id to a stream.
    async fn fetch_stream(
        &self,
        instance: &Instance,
        route: &Route,
        track_id: &str,
        preferences: StreamPreferences,
    ) -> Result<ResolvedStream, ResolutionError>;

    /// Free-text search. Results come back in provider rank order with
    /// `relevance` left at 0; the resolver normalizes it.
    async fn search(
        &self,
        instance: &Instance,
        route: &Route,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ProviderResult>, ResolutionError>;
}

/// Turns a source descriptor into a playable/fetchable stream.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, request: &ResolutionRequest) -> Result<ResolvedStream, ResolutionError>;
}

/// Provider-side free-text search.
#[async_trait]
pub trait ProviderSearch: Send + Sync {
    /// Search `kinds` in order, returning up to `limit` results per kind.
    async fn search(
        &self,
        query: &str,
        kinds: &[ProviderKind],
        limit: usize,
    ) -> Result<Vec<ProviderResult>, ResolutionError>;
}
