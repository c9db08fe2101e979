//! Catalog: the persistent store of known tracks.
//!
//! Every subsystem reads and writes tracks through the [`Catalog`] trait.
//! Changes are published on a broadcast channel so observers (UI, CLI)
//! can follow along without polling.
//!
//! Implementations:
//! - [`SqliteCatalog`] - SQLx/SQLite, the production store
//! - [`MemoryCatalog`] - in-process, for tests and throwaway sessions

mod memory;
mod sqlite;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::model::{SourceDescriptor, Track, TrackId};

pub use memory::MemoryCatalog;
pub use sqlite::SqliteCatalog;

/// Capacity of the change broadcast; slow subscribers see `Lagged`.
const EVENT_CAPACITY: usize = 256;

/// A change to the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogEvent {
    Inserted(TrackId),
    LocalContentChanged(TrackId),
    Played(TrackId),
    FavoriteChanged { id: TrackId, favorite: bool },
}

/// Errors from catalog operations
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Track not found: {0}")]
    NotFound(TrackId),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row for {id}: {message}")]
    Corrupt { id: String, message: String },
}

/// Track store.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn find_by_id(&self, id: &TrackId) -> Result<Option<Track>, CatalogError>;

    /// Look up a track by its origin.
    async fn find_by_source(&self, source: &SourceDescriptor) -> Result<Option<Track>, CatalogError>;

    /// Case-insensitive search: every word of `text` must occur in the
    /// title or artist.
    async fn search(&self, text: &str) -> Result<Vec<Track>, CatalogError>;

    /// Most recently added tracks first.
    async fn list(&self, limit: usize) -> Result<Vec<Track>, CatalogError>;

    /// Insert a track. If its origin is already catalogued, nothing is
    /// written and the existing id is returned.
    async fn insert(&self, track: Track) -> Result<TrackId, CatalogError>;

    async fn update_local_content(&self, id: &TrackId, path: &Path) -> Result<(), CatalogError>;

    async fn increment_play(&self, id: &TrackId, at: DateTime<Utc>) -> Result<(), CatalogError>;

    async fn set_favorite(&self, id: &TrackId, favorite: bool) -> Result<(), CatalogError>;

    /// Follow catalog changes from now on.
    fn subscribe(&self) -> broadcast::Receiver<CatalogEvent>;
}

/// Lowercased search words.
fn search_words(text: &str) -> Vec<String> {
    text.split_whitespace().map(|w| w.to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProviderKind;
    use crate::test_utils::{mock_track, temp_db};
    use std::sync::Arc;

    /// Contract shared by both implementations.
    async fn exercise_contract(catalog: Arc<dyn Catalog>) {
        let mut events = catalog.subscribe();

        let track = mock_track(ProviderKind::YouTube, "aaaaaaaaaaa", "Yesterday", "The Beatles", 125);
        let id = catalog.insert(track.clone()).await.unwrap();
        assert_eq!(id, track.id);
        assert_eq!(events.recv().await.unwrap(), CatalogEvent::Inserted(id.clone()));

        // Same origin, new id: existing id comes back, no duplicate row
        let dup = mock_track(ProviderKind::YouTube, "aaaaaaaaaaa", "Yesterday (Live)", "Beatles", 130);
        assert_eq!(catalog.insert(dup).await.unwrap(), id);
        assert_eq!(catalog.list(10).await.unwrap().len(), 1);

        let found = catalog.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(found.title, "Yesterday");
        assert_eq!(found.duration_secs, 125);
        assert_eq!(
            catalog.find_by_source(&track.source).await.unwrap().map(|t| t.id),
            Some(id.clone())
        );

        assert_eq!(catalog.search("beatles yest").await.unwrap().len(), 1);
        assert!(catalog.search("stones").await.unwrap().is_empty());

        catalog.update_local_content(&id, Path::new("/music/y.m4a")).await.unwrap();
        catalog.increment_play(&id, Utc::now()).await.unwrap();
        catalog.increment_play(&id, Utc::now()).await.unwrap();
        catalog.set_favorite(&id, true).await.unwrap();

        let updated = catalog.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(updated.local_content.as_deref(), Some(Path::new("/music/y.m4a")));
        assert_eq!(updated.play_count, 2);
        assert!(updated.last_played_at.is_some());
        assert!(updated.favorite);

        let missing = TrackId::from("missing");
        assert!(matches!(
            catalog.increment_play(&missing, Utc::now()).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_catalog_contract() {
        exercise_contract(Arc::new(MemoryCatalog::new())).await;
    }

    #[tokio::test]
    async fn test_sqlite_catalog_contract() {
        let (pool, _dir) = temp_db().await;
        exercise_contract(Arc::new(SqliteCatalog::new(pool))).await;
    }
}
