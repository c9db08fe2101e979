//! Database pool setup.
//!
//! Uses SQLx with SQLite for lightweight, embedded storage. The catalog
//! and the download task store share one pool.
//!
//! # Example
//!
//! ```ignore
//! use quezic::db::{db_url, init_db};
//!
//! let pool = init_db(&db_url(Some(Path::new("quezic.db")))).await?;
//! ```

use std::path::Path;

use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "quezic.db";

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file (and its parent directory) if missing,
/// establishes a pool with up to 5 connections, and runs pending
/// migrations.
pub async fn init_db(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = db_url.strip_prefix("sqlite:").map(Path::new).and_then(Path::parent)
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Current time as unix milliseconds, the timestamp format of every table.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Convert stored unix milliseconds back to a timestamp.
pub(crate) fn from_millis(ms: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_url() {
        assert_eq!(db_url(None), "sqlite:quezic.db");
        assert_eq!(db_url(Some(Path::new("/tmp/x.db"))), "sqlite:/tmp/x.db");
    }

    #[tokio::test]
    async fn test_init_creates_nested_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b.db");
        let pool = init_db(&db_url(Some(&path))).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tracks")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert!(path.exists());
    }

    #[test]
    fn test_millis_roundtrip() {
        let ms = 1_767_225_600_123;
        assert_eq!(from_millis(ms).timestamp_millis(), ms);
    }
}
