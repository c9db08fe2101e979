//! SQLite-backed catalog.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::sqlite::SqlitePool;
use tokio::sync::broadcast;

use super::{Catalog, CatalogError, CatalogEvent, EVENT_CAPACITY, search_words};
use crate::db::from_millis;
use crate::model::{SourceDescriptor, Track, TrackId};

const SELECT_TRACK: &str = "SELECT id, title, artist, album, duration_secs, thumbnail_url, local_path, \
     provider_kind, provider_track_id, origin_url, genre, created_at, play_count, last_played_at, favorite \
     FROM tracks";

/// Row shape of the `tracks` table.
#[derive(Debug, FromRow)]
struct TrackRow {
    id: String,
    title: String,
    artist: String,
    album: Option<String>,
    duration_secs: i64,
    thumbnail_url: Option<String>,
    local_path: Option<String>,
    provider_kind: String,
    provider_track_id: String,
    origin_url: Option<String>,
    genre: Option<String>,
    created_at: i64,
    play_count: i64,
    last_played_at: Option<i64>,
    favorite: bool,
}

impl TryFrom<TrackRow> for Track {
    type Error = CatalogError;

    fn try_from(row: TrackRow) -> Result<Self, Self::Error> {
        let kind = row.provider_kind.parse().map_err(|message| CatalogError::Corrupt {
            id: row.id.clone(),
            message,
        })?;
        Ok(Track {
            id: TrackId::from(row.id),
            title: row.title,
            artist: row.artist,
            album: row.album,
            duration_secs: row.duration_secs.max(0) as u32,
            thumbnail_url: row.thumbnail_url,
            local_content: row.local_path.map(PathBuf::from),
            source: SourceDescriptor {
                kind,
                track_id: row.provider_track_id,
                origin_url: row.origin_url,
            },
            genre: row.genre,
            created_at: from_millis(row.created_at),
            play_count: row.play_count.max(0) as u32,
            last_played_at: row.last_played_at.map(from_millis),
            favorite: row.favorite,
        })
    }
}

fn to_tracks(rows: Vec<TrackRow>) -> Result<Vec<Track>, CatalogError> {
    rows.into_iter().map(Track::try_from).collect()
}

/// Catalog stored in the `tracks` table.
pub struct SqliteCatalog {
    pool: SqlitePool,
    events: broadcast::Sender<CatalogEvent>,
}

impl SqliteCatalog {
    /// Wrap an initialized pool (see [`crate::db::init_db`]).
    pub fn new(pool: SqlitePool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { pool, events }
    }

    fn notify(&self, event: CatalogEvent) {
        let _ = self.events.send(event);
    }

    fn require_row(id: &TrackId, rows_affected: u64) -> Result<(), CatalogError> {
        if rows_affected == 0 {
            Err(CatalogError::NotFound(id.clone()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn find_by_id(&self, id: &TrackId) -> Result<Option<Track>, CatalogError> {
        let row: Option<TrackRow> = sqlx::query_as(&format!("{SELECT_TRACK} WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Track::try_from).transpose()
    }

    async fn find_by_source(&self, source: &SourceDescriptor) -> Result<Option<Track>, CatalogError> {
        let row: Option<TrackRow> = sqlx::query_as(&format!(
            "{SELECT_TRACK} WHERE provider_kind = ? AND provider_track_id = ?"
        ))
        .bind(source.kind.as_str())
        .bind(&source.track_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Track::try_from).transpose()
    }

    async fn search(&self, text: &str) -> Result<Vec<Track>, CatalogError> {
        let words = search_words(text);
        let mut sql = format!("{SELECT_TRACK} WHERE 1 = 1");
        for _ in &words {
            sql.push_str(" AND LOWER(title || ' ' || artist) LIKE ?");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT 200");

        let mut query = sqlx::query_as::<_, TrackRow>(&sql);
        for word in words {
            query = query.bind(format!("%{word}%"));
        }
        to_tracks(query.fetch_all(&self.pool).await?)
    }

    async fn list(&self, limit: usize) -> Result<Vec<Track>, CatalogError> {
        let rows: Vec<TrackRow> = sqlx::query_as(&format!("{SELECT_TRACK} ORDER BY created_at DESC, rowid DESC LIMIT ?"))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        to_tracks(rows)
    }

    async fn insert(&self, track: Track) -> Result<TrackId, CatalogError> {
        let result = sqlx::query(
            "INSERT INTO tracks (id, title, artist, album, duration_secs, thumbnail_url, local_path, \
             provider_kind, provider_track_id, origin_url, genre, created_at, play_count, last_played_at, favorite) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(provider_kind, provider_track_id) DO NOTHING",
        )
        .bind(track.id.as_str())
        .bind(&track.title)
        .bind(&track.artist)
        .bind(&track.album)
        .bind(track.duration_secs as i64)
        .bind(&track.thumbnail_url)
        .bind(track.local_content.as_ref().map(|p| p.to_string_lossy().to_string()))
        .bind(track.source.kind.as_str())
        .bind(&track.source.track_id)
        .bind(&track.source.origin_url)
        .bind(&track.genre)
        .bind(track.created_at.timestamp_millis())
        .bind(track.play_count as i64)
        .bind(track.last_played_at.map(|t| t.timestamp_millis()))
        .bind(track.favorite)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let (existing,): (String,) = sqlx::query_as(
                "SELECT id FROM tracks WHERE provider_kind = ? AND provider_track_id = ?",
            )
            .bind(track.source.kind.as_str())
            .bind(&track.source.track_id)
            .fetch_one(&self.pool)
            .await?;
            return Ok(TrackId::from(existing));
        }

        self.notify(CatalogEvent::Inserted(track.id.clone()));
        Ok(track.id)
    }

    async fn update_local_content(&self, id: &TrackId, path: &Path) -> Result<(), CatalogError> {
        let result = sqlx::query("UPDATE tracks SET local_path = ? WHERE id = ?")
            .bind(path.to_string_lossy().to_string())
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Self::require_row(id, result.rows_affected())?;
        self.notify(CatalogEvent::LocalContentChanged(id.clone()));
        Ok(())
    }

    async fn increment_play(&self, id: &TrackId, at: DateTime<Utc>) -> Result<(), CatalogError> {
        let result = sqlx::query(
            "UPDATE tracks SET play_count = play_count + 1, last_played_at = ? WHERE id = ?",
        )
        .bind(at.timestamp_millis())
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;
        Self::require_row(id, result.rows_affected())?;
        self.notify(CatalogEvent::Played(id.clone()));
        Ok(())
    }

    async fn set_favorite(&self, id: &TrackId, favorite: bool) -> Result<(), CatalogError> {
        let result = sqlx::query("UPDATE tracks SET favorite = ? WHERE id = ?")
            .bind(favorite)
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Self::require_row(id, result.rows_affected())?;
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
