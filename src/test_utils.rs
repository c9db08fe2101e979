//! Test utilities and fixtures.
//!
//! Common helpers, mock factories and database utilities shared by the
//! unit tests of every subsystem.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{temp_db, mock_track};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (pool, _dir) = temp_db().await;
//!     let track = mock_track(ProviderKind::YouTube, "dQw4w9WgXcQ", "Song", "Artist", 200);
//! }
//! ```

use std::time::Duration;

use parking_lot::Mutex;
use sqlx::sqlite::SqlitePool;
use tempfile::TempDir;

use crate::events::{Event, EventSink};
use crate::model::{ProviderKind, SourceDescriptor, Track};

/// Creates a temporary database for testing.
///
/// The database lives in a temporary directory that is removed when the
/// returned `TempDir` is dropped. Migrations are run automatically.
/// Keep the TempDir alive for the duration of your test.
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");
    let db_url = format!("sqlite:{}", db_path.display());

    let pool = crate::db::init_db(&db_url)
        .await
        .expect("Failed to initialize test database");

    (pool, dir)
}

/// Creates a catalog track with the given origin and metadata.
///
/// Customize further with struct update syntax or field assignment.
pub fn mock_track(kind: ProviderKind, provider_id: &str, title: &str, artist: &str, duration_secs: u32) -> Track {
    Track::new(title, artist, duration_secs, SourceDescriptor::new(kind, provider_id))
}

/// Event sink that records everything it receives.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Poll until `predicate` holds for the recorded events, or panic.
    pub async fn wait_until<F>(&self, predicate: F)
    where
        F: Fn(&[Event]) -> bool,
    {
        for _ in 0..500 {
            if predicate(&self.events.lock()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached; events: {:#?}", self.events());
    }
}

impl EventSink for RecordingSink {
    fn notify(&self, event: Event) {
        self.events.lock().push(event);
    }
}
