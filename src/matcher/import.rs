//! Playlist import: match a batch of external rows one by one.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use super::{MatchCandidate, MatchError, MatchQuery, MetadataMatcher};
use crate::catalog::Catalog;

/// Log a progress line every this many rows.
const PROGRESS_EVERY: usize = 10;

/// One row of an exported playlist.
///
/// Field names follow common playlist exports (`name` is accepted for the
/// title, durations arrive in milliseconds).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportRow {
    #[serde(alias = "name", alias = "track")]
    pub title: String,
    #[serde(alias = "artists")]
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl From<&ImportRow> for MatchQuery {
    fn from(row: &ImportRow) -> Self {
        MatchQuery {
            title: row.title.clone(),
            artist: row.artist.clone(),
            album: row.album.clone(),
            duration_secs: row
                .duration_ms
                .filter(|ms| *ms > 0)
                .map(|ms| ((ms + 500) / 1000).min(u32::MAX as u64) as u32),
        }
    }
}

/// Result for one imported row.
#[derive(Debug)]
pub struct ImportOutcome {
    pub query: MatchQuery,
    pub result: Result<MatchCandidate, MatchError>,
}

impl ImportOutcome {
    /// Whether this row went to the providers.
    fn hit_providers(&self) -> bool {
        match &self.result {
            Ok(candidate) => candidate.provisional,
            Err(MatchError::Catalog(_)) => false,
            Err(_) => true,
        }
    }
}

/// Matches playlist rows against the catalog, pacing provider searches.
pub struct PlaylistImporter {
    matcher: Arc<MetadataMatcher>,
    catalog: Arc<dyn Catalog>,
    delay: Duration,
}

impl PlaylistImporter {
    pub fn new(matcher: Arc<MetadataMatcher>, catalog: Arc<dyn Catalog>, delay: Duration) -> Self {
        Self {
            matcher,
            catalog,
            delay,
        }
    }

    /// Match every row in order. A failing row never aborts the batch.
    ///
    /// The candidate pool for each row is the catalog's text search for
    /// the row's title.
    pub async fn import(&self, rows: &[ImportRow]) -> Vec<ImportOutcome> {
        let total = rows.len();
        let mut outcomes = Vec::with_capacity(total);

        for (i, row) in rows.iter().enumerate() {
            let query = MatchQuery::from(row);
            let result = match self.pool_for(&query).await {
                Ok(pool) => self.matcher.match_track(&query, &pool).await,
                Err(e) => Err(e),
            };

            if let Err(ref e) = result {
                warn!(target: "matcher", title = %query.title, artist = %query.artist, "Import row failed: {}", e);
            }

            let outcome = ImportOutcome { query, result };
            let paced = outcome.hit_providers();
            outcomes.push(outcome);

            if (i + 1) % PROGRESS_EVERY == 0 || i + 1 == total {
                info!(target: "matcher", "Imported {}/{} rows", i + 1, total);
            }

            if paced && i + 1 < total && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        outcomes
    }

    async fn pool_for(&self, query: &MatchQuery) -> Result<Vec<crate::model::Track>, MatchError> {
        let title = super::similarity::clean_title(&query.title);
        Ok(self.catalog.search(&title).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::extraction::traits::mocks::{MockSearch, hit};
    use crate::matcher::MatcherConfig;
    use crate::model::ProviderKind;
    use crate::test_utils::mock_track;

    fn row(title: &str, artist: &str, duration_ms: Option<u64>) -> ImportRow {
        ImportRow {
            title: title.to_string(),
            artist: artist.to_string(),
            album: None,
            duration_ms,
        }
    }

    #[test]
    fn test_row_deserializes_aliases() {
        let json = r#"[{"name": "Yesterday", "artist": "The Beatles", "duration_ms": 125400}]"#;
        let rows: Vec<ImportRow> = serde_json::from_str(json).unwrap();
        let query = MatchQuery::from(&rows[0]);
        assert_eq!(query.title, "Yesterday");
        assert_eq!(query.duration_secs, Some(125));
    }

    #[test]
    fn test_zero_duration_is_unknown() {
        assert_eq!(MatchQuery::from(&row("a", "b", Some(0))).duration_secs, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_uses_catalog_then_providers() {
        let catalog = Arc::new(MemoryCatalog::new());
        let known = mock_track(ProviderKind::YouTube, "aaaaaaaaaaa", "Yesterday", "The Beatles", 125);
        catalog.insert(known.clone()).await.unwrap();

        let search = Arc::new(MockSearch::with_results(vec![hit(
            "bbbbbbbbbbb",
            "Wonderwall",
            "Oasis",
            Some(258),
            1.0,
        )]));
        let matcher = Arc::new(MetadataMatcher::new(
            catalog.clone(),
            search.clone(),
            MatcherConfig::default(),
        ));
        let importer = PlaylistImporter::new(matcher, catalog.clone(), Duration::from_millis(300));

        let start = tokio::time::Instant::now();
        let outcomes = importer
            .import(&[
                row("Wonderwall", "Oasis", Some(258_000)),
                row("Yesterday", "The Beatles", Some(125_000)),
            ])
            .await;

        assert_eq!(outcomes.len(), 2);
        let first = outcomes[0].result.as_ref().unwrap();
        assert!(first.provisional);
        let second = outcomes[1].result.as_ref().unwrap();
        assert!(!second.provisional);
        assert_eq!(second.track.id, known.id);
        assert_eq!(search.query_count(), 1);
        // One pause after the provider-backed row
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_failed_row_does_not_abort_batch() {
        let catalog = Arc::new(MemoryCatalog::new());
        let search = Arc::new(MockSearch::empty());
        let matcher = Arc::new(MetadataMatcher::new(catalog.clone(), search, MatcherConfig::default()));
        let importer = PlaylistImporter::new(matcher, catalog, Duration::ZERO);

        let outcomes = importer
            .import(&[row("One", "A", None), row("Two", "B", None)])
            .await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| matches!(o.result, Err(MatchError::NoResults(_)))));
    }
}
