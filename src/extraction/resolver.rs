//! Extraction resolver: fallback across backends, instances and routes.
//!
//! Provider behaviour is looked up per [`ProviderKind`] in a table of
//! [`ProviderChain`]s instead of being branched on inline, so adding a
//! provider means adding a table entry.
//!
//! For one resolution the resolver walks, in order:
//!
//! ```text
//! backend (relay order) -> instance (priority order) -> route (direct, proxies)
//! ```
//!
//! and returns the first success. Each attempt is bounded by its own
//! timeout; an elapsed attempt counts as `ProviderUnavailable` and the walk
//! continues.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::domain::{ProviderResult, ResolutionError, ResolutionRequest, ResolvedStream, RoutingHandle};
use super::invidious::InvidiousClient;
use super::piped::PipedClient;
use super::soundcloud::SoundCloudClient;
use super::traits::{ProviderClient, ProviderSearch, StreamResolver};
use super::transport::HttpTransport;
use crate::config::{Config, ProvidersConfig};
use crate::model::ProviderKind;

/// How a provider kind is reached.
#[derive(Clone)]
pub enum ProviderChain {
    /// Ordered relay frontends, each with its own instance list
    Relay(Vec<Arc<dyn ProviderClient>>),
    /// A single direct API
    Direct(Arc<dyn ProviderClient>),
}

impl ProviderChain {
    fn backends(&self) -> Vec<Arc<dyn ProviderClient>> {
        match self {
            ProviderChain::Relay(backends) => backends.clone(),
            ProviderChain::Direct(client) => vec![Arc::clone(client)],
        }
    }
}

/// Keeps the most specific failure seen across attempts.
#[derive(Default)]
struct FailureLog {
    attempts: usize,
    worst: Option<ResolutionError>,
}

impl FailureLog {
    fn record(&mut self, err: ResolutionError) {
        self.attempts += 1;
        let replace = self
            .worst
            .as_ref()
            .is_none_or(|current| err.specificity() > current.specificity());
        if replace {
            self.worst = Some(err);
        }
    }

    fn into_error(self, kind: ProviderKind) -> ResolutionError {
        self.worst.unwrap_or_else(|| {
            ResolutionError::ProviderUnavailable(format!("no instances configured for {kind}"))
        })
    }
}

/// Resolver over a table of provider chains.
pub struct ExtractionResolver {
    chains: HashMap<ProviderKind, ProviderChain>,
    attempt_timeout: Duration,
    /// Routing used for searches (resolution takes it per request)
    routing: RoutingHandle,
}

impl ExtractionResolver {
    pub fn new(attempt_timeout: Duration, routing: RoutingHandle) -> Self {
        Self {
            chains: HashMap::new(),
            attempt_timeout,
            routing,
        }
    }

    /// Register (or replace) the chain for a provider kind.
    pub fn with_chain(mut self, kind: ProviderKind, chain: ProviderChain) -> Self {
        self.chains.insert(kind, chain);
        self
    }

    /// Build the production table from configuration.
    pub fn from_config(config: &Config, routing: RoutingHandle) -> Result<Self, ResolutionError> {
        let timeout = Duration::from_secs(config.network.attempt_timeout_secs);
        let transport = Arc::new(HttpTransport::new(timeout, config.network.user_agent.as_deref())?);

        let relays = relay_backends(&config.providers, &transport);
        let soundcloud = SoundCloudClient::new(
            Arc::clone(&transport),
            &config.providers.soundcloud_api_url,
            config.credentials.soundcloud_client_id.clone(),
        );

        Ok(Self::new(timeout, routing)
            .with_chain(ProviderKind::YouTube, ProviderChain::Relay(relays))
            .with_chain(ProviderKind::SoundCloud, ProviderChain::Direct(Arc::new(soundcloud))))
    }

    fn chain(&self, kind: ProviderKind) -> Result<&ProviderChain, ResolutionError> {
        self.chains
            .get(&kind)
            .ok_or(ResolutionError::UnsupportedProvider(kind))
    }

    /// Resolve a descriptor to a stream, trying every backend, instance
    /// and route before giving up.
    pub async fn resolve(&self, request: &ResolutionRequest) -> Result<ResolvedStream, ResolutionError> {
        let kind = request.descriptor.kind;
        let chain = self.chain(kind)?;
        let routes = request.routing.routes();
        let track_id = request.descriptor.track_id.as_str();
        let mut failures = FailureLog::default();

        for backend in chain.backends() {
            for instance in backend.instances() {
                for route in &routes {
                    debug!(
                        target: "extraction",
                        backend = backend.name(),
                        host = instance.host(),
                        %route,
                        track = track_id,
                        "Resolution attempt"
                    );
                    let attempt = backend.fetch_stream(&instance, route, track_id, request.preferences);
                    match tokio::time::timeout(self.attempt_timeout, attempt).await {
                        Ok(Ok(stream)) => {
                            info!(
                                target: "extraction",
                                backend = backend.name(),
                                host = instance.host(),
                                %route,
                                track = track_id,
                                "Resolved stream"
                            );
                            return Ok(stream);
                        }
                        Ok(Err(err)) => {
                            warn!(target: "extraction", backend = backend.name(), host = instance.host(), %route, error = %err, "Attempt failed");
                            failures.record(err);
                        }
                        Err(_) => {
                            warn!(target: "extraction", backend = backend.name(), host = instance.host(), %route, "Attempt timed out");
                            failures.record(ResolutionError::ProviderUnavailable(format!(
                                "{} via {} timed out after {:?}",
                                instance.host(),
                                route,
                                self.attempt_timeout
                            )));
                        }
                    }
                }
            }
        }

        let attempts = failures.attempts;
        let err = failures.into_error(kind);
        warn!(target: "extraction", track = track_id, attempts, error = %err, "Resolution exhausted");
        Err(err)
    }

    /// Search one provider kind, stopping at the first backend/instance
    /// that answers. Relevance is normalized from rank: for `n` results,
    /// result `i` gets `(n - i) / n`.
    pub async fn search_kind(
        &self,
        query: &str,
        kind: ProviderKind,
        limit: usize,
    ) -> Result<Vec<ProviderResult>, ResolutionError> {
        let chain = self.chain(kind)?;
        let routes = self.routing.current().routes();
        let mut failures = FailureLog::default();

        for backend in chain.backends() {
            for instance in backend.instances() {
                for route in &routes {
                    let attempt = backend.search(&instance, route, query, limit);
                    match tokio::time::timeout(self.attempt_timeout, attempt).await {
                        Ok(Ok(mut results)) => {
                            let n = results.len();
                            for (i, result) in results.iter_mut().enumerate() {
                                result.relevance = (n - i) as f32 / n as f32;
                            }
                            return Ok(results);
                        }
                        Ok(Err(err)) => failures.record(err),
                        Err(_) => failures.record(ResolutionError::ProviderUnavailable(format!(
                            "search on {} timed out",
                            instance.host()
                        ))),
                    }
                }
            }
        }
        Err(failures.into_error(kind))
    }
}

fn relay_backends(config: &ProvidersConfig, transport: &Arc<HttpTransport>) -> Vec<Arc<dyn ProviderClient>> {
    config
        .relay_order
        .iter()
        .filter_map(|name| -> Option<Arc<dyn ProviderClient>> {
            match name.as_str() {
                "piped" => Some(Arc::new(PipedClient::new(
                    Arc::clone(transport),
                    &config.piped_instances,
                ))),
                "invidious" => Some(Arc::new(InvidiousClient::new(
                    Arc::clone(transport),
                    &config.invidious_instances,
                ))),
                other => {
                    warn!(target: "extraction", backend = other, "Unknown relay backend in config, skipping");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl StreamResolver for ExtractionResolver {
    async fn resolve(&self, request: &ResolutionRequest) -> Result<ResolvedStream, ResolutionError> {
        ExtractionResolver::resolve(self, request).await
    }
}

#[async_trait]
impl ProviderSearch for ExtractionResolver {
    /// Results are concatenated in `kinds` order. A kind that fails is
    /// skipped unless every kind fails.
    async fn search(
        &self,
        query: &str,
        kinds: &[ProviderKind],
        limit: usize,
    ) -> Result<Vec<ProviderResult>, ResolutionError> {
        let mut all = Vec::new();
        let mut last_err = None;
        for &kind in kinds {
            match self.search_kind(query, kind, limit).await {
                Ok(results) => all.extend(results),
                Err(err) => {
                    warn!(target: "extraction", %kind, error = %err, "Search failed");
                    last_err = Some(err);
                }
            }
        }
        match last_err {
            Some(err) if all.is_empty() => Err(err),
            _ => Ok(all),
        }
    }
}
