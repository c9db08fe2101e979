//! Durable download task table.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::FromRow;
use sqlx::sqlite::SqlitePool;

use super::DownloadError;
use super::task::DownloadTask;
use crate::db::from_millis;
use crate::model::TrackId;

/// Persistence for download tasks, one row per track.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Every task, oldest enqueue first.
    async fn load_all(&self) -> Result<Vec<DownloadTask>, DownloadError>;

    async fn get(&self, track_id: &TrackId) -> Result<Option<DownloadTask>, DownloadError>;

    /// Insert or replace the task for its track.
    async fn put(&self, task: &DownloadTask) -> Result<(), DownloadError>;
}

// ============================================================================
// In-memory store
// ============================================================================

/// Task store that lives only as long as the process.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<TrackId, DownloadTask>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn load_all(&self) -> Result<Vec<DownloadTask>, DownloadError> {
        let mut tasks: Vec<_> = self.tasks.read().values().cloned().collect();
        tasks.sort_by_key(|t| t.enqueued_at);
        Ok(tasks)
    }

    async fn get(&self, track_id: &TrackId) -> Result<Option<DownloadTask>, DownloadError> {
        Ok(self.tasks.read().get(track_id).cloned())
    }

    async fn put(&self, task: &DownloadTask) -> Result<(), DownloadError> {
        self.tasks.write().insert(task.track_id.clone(), task.clone());
        Ok(())
    }
}

// ============================================================================
// SQLite store
// ============================================================================

#[derive(Debug, FromRow)]
struct TaskRow {
    track_id: String,
    status: String,
    attempts: i64,
    last_error: Option<String>,
    enqueued_at: i64,
    updated_at: i64,
    next_attempt_at: Option<i64>,
}

impl TryFrom<TaskRow> for DownloadTask {
    type Error = DownloadError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let corrupt = |message: String| DownloadError::Corrupt {
            track_id: row.track_id.clone(),
            message,
        };
        let status = row.status.parse().map_err(corrupt)?;
        let last_error = row.last_error.as_deref().map(str::parse).transpose().map_err(corrupt)?;

        Ok(DownloadTask {
            track_id: TrackId::from(row.track_id.as_str()),
            status,
            attempts: row.attempts.max(0) as u32,
            last_error,
            enqueued_at: from_millis(row.enqueued_at),
            updated_at: from_millis(row.updated_at),
            next_attempt_at: row.next_attempt_at.map(from_millis),
        })
    }
}

const SELECT_TASK: &str = "SELECT track_id, status, attempts, last_error, enqueued_at, updated_at, next_attempt_at \
     FROM download_tasks";

/// Task store in the `download_tasks` table.
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn load_all(&self) -> Result<Vec<DownloadTask>, DownloadError> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!("{SELECT_TASK} ORDER BY enqueued_at ASC"))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(DownloadTask::try_from).collect()
    }

    async fn get(&self, track_id: &TrackId) -> Result<Option<DownloadTask>, DownloadError> {
        let row: Option<TaskRow> = sqlx::query_as(&format!("{SELECT_TASK} WHERE track_id = ?"))
            .bind(track_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(DownloadTask::try_from).transpose()
    }

    async fn put(&self, task: &DownloadTask) -> Result<(), DownloadError> {
        sqlx::query(
            "INSERT INTO download_tasks \
             (track_id, status, attempts, last_error, enqueued_at, updated_at, next_attempt_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(track_id) DO UPDATE SET \
             status = excluded.status, attempts = excluded.attempts, last_error = excluded.last_error, \
             enqueued_at = excluded.enqueued_at, updated_at = excluded.updated_at, \
             next_attempt_at = excluded.next_attempt_at",
        )
        .bind(task.track_id.as_str())
        .bind(task.status.as_str())
        .bind(task.attempts as i64)
        .bind(task.last_error.map(|k| k.as_str()))
        .bind(task.enqueued_at.timestamp_millis())
        .bind(task.updated_at.timestamp_millis())
        .bind(task.next_attempt_at.map(|t| t.timestamp_millis()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::task::{DownloadErrorKind, DownloadStatus};
    use crate::test_utils::temp_db;
    use std::sync::Arc;

    async fn exercise(store: Arc<dyn TaskStore>) {
        let id = TrackId::from("track-1");
        assert!(store.get(&id).await.unwrap().is_none());

        let mut task = DownloadTask::new(id.clone());
        store.put(&task).await.unwrap();

        task.transition(DownloadStatus::Retrying);
        task.attempts = 2;
        task.last_error = Some(DownloadErrorKind::RateLimited);
        task.next_attempt_at = Some(chrono::Utc::now());
        store.put(&task).await.unwrap();

        let loaded = store.get(&id).await.unwrap().unwrap();
        assert_eq!(loaded.status, DownloadStatus::Retrying);
        assert_eq!(loaded.attempts, 2);
        assert_eq!(loaded.last_error, Some(DownloadErrorKind::RateLimited));
        assert!(loaded.next_attempt_at.is_some());

        let mut other = DownloadTask::new(TrackId::from("track-2"));
        other.enqueued_at = task.enqueued_at + chrono::Duration::seconds(1);
        store.put(&other).await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].track_id, id);
    }

    #[tokio::test]
    async fn test_memory_store() {
        exercise(Arc::new(MemoryTaskStore::new())).await;
    }

    #[tokio::test]
    async fn test_sqlite_store() {
        let (pool, _dir) = temp_db().await;
        exercise(Arc::new(SqliteTaskStore::new(pool))).await;
    }

    #[tokio::test]
    async fn test_sqlite_rejects_unknown_status() {
        let (pool, _dir) = temp_db().await;
        sqlx::query(
            "INSERT INTO download_tasks (track_id, status, attempts, enqueued_at, updated_at) \
             VALUES ('x', 'exploded', 0, 0, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();
        let store = SqliteTaskStore::new(pool);
        assert!(matches!(
            store.get(&TrackId::from("x")).await,
            Err(DownloadError::Corrupt { .. })
        ));
    }
}
