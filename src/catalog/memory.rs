//! In-memory catalog.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::{Catalog, CatalogError, CatalogEvent, EVENT_CAPACITY, search_words};
use crate::model::{SourceDescriptor, Track, TrackId};

/// Catalog held in a map, insertion order kept for `list`.
pub struct MemoryCatalog {
    tracks: RwLock<Tables>,
    events: broadcast::Sender<CatalogEvent>,
}

#[derive(Default)]
struct Tables {
    by_id: HashMap<TrackId, Track>,
    order: Vec<TrackId>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            tracks: RwLock::new(Tables::default()),
            events,
        }
    }

    /// Seed with tracks (test and demo helper).
    pub fn with_tracks(tracks: impl IntoIterator<Item = Track>) -> Self {
        let catalog = Self::new();
        {
            let mut tables = catalog.tracks.write();
            for track in tracks {
                tables.order.push(track.id.clone());
                tables.by_id.insert(track.id.clone(), track);
            }
        }
        catalog
    }

    fn update<F>(&self, id: &TrackId, f: F) -> Result<(), CatalogError>
    where
        F: FnOnce(&mut Track),
    {
        let mut tables = self.tracks.write();
        let track = tables
            .by_id
            .get_mut(id)
            .ok_or_else(|| CatalogError::NotFound(id.clone()))?;
        f(track);
        Ok(())
    }

    fn notify(&self, event: CatalogEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn find_by_id(&self, id: &TrackId) -> Result<Option<Track>, CatalogError> {
        Ok(self.tracks.read().by_id.get(id).cloned())
    }

    async fn find_by_source(&self, source: &SourceDescriptor) -> Result<Option<Track>, CatalogError> {
        Ok(self
            .tracks
            .read()
            .by_id
            .values()
            .find(|t| t.source.kind == source.kind && t.source.track_id == source.track_id)
            .cloned())
    }

    async fn search(&self, text: &str) -> Result<Vec<Track>, CatalogError> {
        let words = search_words(text);
        let tables = self.tracks.read();
        Ok(tables
            .order
            .iter()
            .filter_map(|id| tables.by_id.get(id))
            .filter(|t| {
                let haystack = format!("{} {}", t.title, t.artist).to_lowercase();
                words.iter().all(|w| haystack.contains(w.as_str()))
            })
            .cloned()
            .collect())
    }

    async fn list(&self, limit: usize) -> Result<Vec<Track>, CatalogError> {
        let tables = self.tracks.read();
        Ok(tables
            .order
            .iter()
            .rev()
            .filter_map(|id| tables.by_id.get(id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert(&self, track: Track) -> Result<TrackId, CatalogError> {
        let id = {
            let mut tables = self.tracks.write();
            let existing = tables
                .by_id
                .values()
                .find(|t| t.source.kind == track.source.kind && t.source.track_id == track.source.track_id)
                .map(|t| t.id.clone());
            if let Some(existing) = existing {
                return Ok(existing);
            }
            let id = track.id.clone();
            tables.order.push(id.clone());
            tables.by_id.insert(id.clone(), track);
            id
        };
        self.notify(CatalogEvent::Inserted(id.clone()));
        Ok(id)
    }

    async fn update_local_content(&self, id: &TrackId, path: &Path) -> Result<(), CatalogError> {
        self.update(id, |t| t.local_content = Some(path.to_path_buf()))?;
        self.notify(CatalogEvent::LocalContentChanged(id.clone()));
        Ok(())
    }

    async fn increment_play(&self, id: &TrackId, at: DateTime<Utc>) -> Result<(), CatalogError> {
        self.update(id, |t| {
            t.play_count += 1;
            t.last_played_at = Some(at);
        })?;
        self.notify(CatalogEvent::Played(id.clone()));
        Ok(())
    }

    async fn set_favorite(&self, id: &TrackId, favorite: bool) -> Result<(), CatalogError> {
        self.update(id, |t| t.favorite = favorite)?;
        self.notify(CatalogEvent::FavoriteChanged {
            id: id.clone(),
            favorite,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.events.subscribe()
    }
}
