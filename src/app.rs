//! Service wiring.
//!
//! Builds the production object graph from a [`Config`]: one SQLite pool
//! shared by the catalog and the download task store, one extraction
//! resolver used for resolution and search, and the services on top.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tracing::info;

use crate::catalog::{Catalog, SqliteCatalog};
use crate::config::Config;
use crate::db;
use crate::download::{
    DownloadDeps, DownloadOrchestrator, DownloadSettings, FsStorage, HttpByteSource, SqliteTaskStore,
};
use crate::error::{Result, ResultExt};
use crate::events::{EventSink, TracingSink};
use crate::extraction::{ExtractionResolver, RoutingHandle};
use crate::matcher::{MetadataMatcher, PlaylistImporter};
use crate::player::{AudioEngine, PlaybackController, PlaybackDeps, PlaybackSettings};
use crate::playlist::PlaylistFetcher;
use crate::recommend::{LastFmClient, Recommender, RecommenderConfig};

/// Connect timeout for download transfers.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Everything the CLI (or an embedding UI) talks to.
pub struct Services {
    pub config: Config,
    pub pool: SqlitePool,
    pub catalog: Arc<dyn Catalog>,
    pub routing: RoutingHandle,
    pub resolver: Arc<ExtractionResolver>,
    pub matcher: Arc<MetadataMatcher>,
    pub importer: PlaylistImporter,
    pub playlists: PlaylistFetcher,
    pub downloads: DownloadOrchestrator,
    pub recommender: Recommender,
    pub sink: Arc<dyn EventSink>,
}

impl Services {
    /// Open the database and build every service, logging events through
    /// `tracing`.
    pub async fn open(config: Config) -> Result<Self> {
        Self::open_with_sink(config, Arc::new(TracingSink)).await
    }

    pub async fn open_with_sink(config: Config, sink: Arc<dyn EventSink>) -> Result<Self> {
        let db_path = config.library.resolved_database();
        let pool = db::init_db(&db::db_url(Some(&db_path)))
            .await
            .with_context(format!("opening database {}", db_path.display()))?;
        info!(target: "app", path = %db_path.display(), "Catalog opened");

        let catalog: Arc<dyn Catalog> = Arc::new(SqliteCatalog::new(pool.clone()));
        let routing = RoutingHandle::new(config.network.routing_policy());
        let resolver = Arc::new(ExtractionResolver::from_config(&config, routing.clone())?);

        let matcher = Arc::new(MetadataMatcher::new(
            Arc::clone(&catalog),
            resolver.clone(),
            config.matcher.to_matcher_config(config.providers.search_limit),
        ));
        let importer = PlaylistImporter::new(
            Arc::clone(&matcher),
            Arc::clone(&catalog),
            config.matcher.import_delay(),
        );
        let playlists = PlaylistFetcher::from_config(&config)?;

        let download_dir = config.downloads.resolved_directory();
        let downloads = DownloadOrchestrator::new(
            DownloadDeps {
                catalog: Arc::clone(&catalog),
                resolver: resolver.clone(),
                source: Arc::new(HttpByteSource::new(
                    CONNECT_TIMEOUT,
                    config.network.user_agent.as_deref(),
                )?),
                storage: Arc::new(FsStorage::new(&download_dir)),
                store: Arc::new(SqliteTaskStore::new(pool.clone())),
                sink: Arc::clone(&sink),
                routing: routing.clone(),
            },
            DownloadSettings::from(&config.downloads),
        );
        info!(target: "app", dir = %download_dir.display(), "Downloads go to");

        let lastfm = LastFmClient::new(
            config.credentials.lastfm_api_key.clone(),
            Duration::from_secs(config.network.attempt_timeout_secs),
        )?;
        let recommender = Recommender::new(
            Arc::new(lastfm),
            resolver.clone(),
            RecommenderConfig::default(),
        );

        Ok(Self {
            config,
            pool,
            catalog,
            routing,
            resolver,
            matcher,
            importer,
            playlists,
            downloads,
            recommender,
            sink,
        })
    }

    /// Start a playback controller that drives `engine`.
    pub fn spawn_player(&self, engine: Arc<dyn AudioEngine>) -> PlaybackController {
        PlaybackController::spawn(
            PlaybackDeps {
                catalog: Arc::clone(&self.catalog),
                resolver: self.resolver.clone(),
                engine,
                sink: Arc::clone(&self.sink),
                routing: self.routing.clone(),
            },
            PlaybackSettings::from(&self.config.playback),
        )
    }

    /// Stop download workers and close the pool.
    pub async fn shutdown(&self) {
        self.downloads.shutdown().await;
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProviderKind, TrackId};
    use crate::player::{ChannelEngine, PlaybackState};
    use crate::test_utils::mock_track;

    fn config_in(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.library.database = Some(dir.join("db").join("quezic.db"));
        config.downloads.directory = Some(dir.join("music"));
        config
    }

    #[tokio::test]
    async fn test_open_wires_shared_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let services = Services::open(config_in(dir.path())).await.unwrap();

        let id = services
            .catalog
            .insert(mock_track(ProviderKind::YouTube, "dQw4w9WgXcQ", "Song", "Artist", 212))
            .await
            .unwrap();

        // The orchestrator sees the same catalog
        let err = services.downloads.enqueue(&TrackId::from("missing")).await.unwrap_err();
        assert!(matches!(err, crate::download::DownloadError::TrackNotFound(_)));
        assert!(services.catalog.find_by_id(&id).await.unwrap().is_some());
        assert!(services.playlists.supports("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M"));

        services.shutdown().await;
    }

    #[tokio::test]
    async fn test_spawned_player_starts_idle() {
        let dir = tempfile::tempdir().unwrap();
        let services = Services::open(config_in(dir.path())).await.unwrap();
        let (engine, _rx) = ChannelEngine::new(8);

        let player = services.spawn_player(Arc::new(engine));
        assert_eq!(player.snapshot().state, PlaybackState::Idle);
        assert!(player.skip_next().await.is_err());

        services.shutdown().await;
    }
}
