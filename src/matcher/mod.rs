//! Metadata matcher: map an external (title, artist, duration) to a track.
//!
//! Candidates from the caller's pool are scored with a weighted blend of
//! title, artist and duration similarity. The best candidate above the
//! acceptance threshold wins. Otherwise the matcher asks the providers and
//! materializes a *provisional* track from the top search hit, so every
//! query ends up pointing at something playable.
//!
//! Scoring is pure ([`MetadataMatcher::score`]); only the fallback path
//! touches the network and the catalog.

mod import;
pub mod similarity;

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{Catalog, CatalogError};
use crate::extraction::{ProviderResult, ProviderSearch, ResolutionError};
use crate::model::{ProviderKind, Track};

pub use import::{ImportOutcome, ImportRow, PlaylistImporter};

/// Scores closer than this are ties.
const SCORE_EPSILON: f32 = 1e-4;

/// External metadata to match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchQuery {
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<u32>,
}

impl MatchQuery {
    pub fn new(title: impl Into<String>, artist: impl Into<String>, duration_secs: Option<u32>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            album: None,
            duration_secs,
        }
    }

    /// Provider search text.
    pub fn search_text(&self) -> String {
        format!(
            "{} {}",
            similarity::clean_artist(&self.artist),
            similarity::clean_title(&self.title)
        )
    }
}

/// Per-component similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub title: f32,
    pub artist: f32,
    /// `None` when either duration is unknown
    pub duration: Option<f32>,
}

/// A scored match.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub track: Track,
    /// In `[0,1]`
    pub score: f32,
    pub breakdown: ScoreBreakdown,
    /// Built from a provider search hit rather than matched in the catalog
    pub provisional: bool,
}

/// Weights and thresholds.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    pub title_weight: f32,
    pub artist_weight: f32,
    pub duration_weight: f32,
    pub acceptance_threshold: f32,
    pub search_limit: usize,
    /// Providers searched on fallback, in order
    pub search_kinds: Vec<ProviderKind>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            title_weight: 0.5,
            artist_weight: 0.35,
            duration_weight: 0.15,
            acceptance_threshold: 0.6,
            search_limit: 10,
            search_kinds: vec![ProviderKind::YouTube, ProviderKind::SoundCloud],
        }
    }
}

/// Errors from matching
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Provider search failed: {0}")]
    Search(#[from] ResolutionError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("No provider results for \"{0}\"")]
    NoResults(String),
}

/// Matcher over a catalog and a provider search.
pub struct MetadataMatcher {
    catalog: Arc<dyn Catalog>,
    search: Arc<dyn ProviderSearch>,
    config: MatcherConfig,
}

impl MetadataMatcher {
    pub fn new(catalog: Arc<dyn Catalog>, search: Arc<dyn ProviderSearch>, config: MatcherConfig) -> Self {
        Self {
            catalog,
            search,
            config,
        }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Score a candidate. The duration term is dropped (and the remaining
    /// weights renormalized) when either duration is unknown.
    pub fn score(&self, query: &MatchQuery, title: &str, artist: &str, duration_secs: Option<u32>) -> (f32, ScoreBreakdown) {
        let breakdown = ScoreBreakdown {
            title: similarity::title_similarity(&query.title, title),
            artist: similarity::artist_similarity(&query.artist, artist),
            duration: match (query.duration_secs.filter(|d| *d > 0), duration_secs.filter(|d| *d > 0)) {
                (Some(a), Some(b)) => Some(similarity::duration_closeness(a, b)),
                _ => None,
            },
        };

        let cfg = &self.config;
        let mut weighted = cfg.title_weight * breakdown.title + cfg.artist_weight * breakdown.artist;
        let mut total = cfg.title_weight + cfg.artist_weight;
        if let Some(closeness) = breakdown.duration {
            weighted += cfg.duration_weight * closeness;
            total += cfg.duration_weight;
        }
        let score = if total > 0.0 { (weighted / total).clamp(0.0, 1.0) } else { 0.0 };
        (score, breakdown)
    }

    fn score_track(&self, query: &MatchQuery, track: &Track) -> MatchCandidate {
        let (score, breakdown) = self.score(query, &track.title, &track.artist, track.known_duration());
        MatchCandidate {
            track: track.clone(),
            score,
            breakdown,
            provisional: false,
        }
    }

    /// Best candidate in `pool` at or above the threshold, if any.
    pub fn best_in_pool(&self, query: &MatchQuery, pool: &[Track]) -> Option<MatchCandidate> {
        pool.iter()
            .map(|track| self.score_track(query, track))
            .filter(|c| c.score >= self.config.acceptance_threshold)
            .max_by(compare_candidates)
    }

    /// Match `query` against `pool`, falling back to a provider search.
    ///
    /// The fallback path inserts exactly one track into the catalog (or
    /// reuses the existing entry for the same origin).
    pub async fn match_track(&self, query: &MatchQuery, pool: &[Track]) -> Result<MatchCandidate, MatchError> {
        if let Some(best) = self.best_in_pool(query, pool) {
            debug!(
                target: "matcher",
                title = %query.title,
                matched = %best.track.id,
                score = best.score,
                "Matched in catalog"
            );
            return Ok(best);
        }

        let text = query.search_text();
        let results = self
            .search
            .search(&text, &self.config.search_kinds, self.config.search_limit)
            .await?;
        let first = results
            .into_iter()
            .next()
            .ok_or_else(|| MatchError::NoResults(text.clone()))?;

        self.materialize(query, first).await
    }

    async fn materialize(&self, query: &MatchQuery, hit: ProviderResult) -> Result<MatchCandidate, MatchError> {
        let (_, breakdown) = self.score(query, &hit.title, &hit.artist, hit.duration_secs);
        let score = hit.relevance.clamp(0.0, 1.0);

        let mut track = hit.to_track();
        track.album = query.album.clone();

        let id = self.catalog.insert(track.clone()).await?;
        let track = if id == track.id {
            track
        } else {
            self.catalog.find_by_id(&id).await?.unwrap_or(track)
        };

        info!(
            target: "matcher",
            title = %query.title,
            provisional = %track.id,
            source = %track.source,
            "No confident catalog match, using provider result"
        );

        Ok(MatchCandidate {
            track,
            score,
            breakdown,
            provisional: true,
        })
    }
}

/// Higher score wins; ties prefer a local copy, then more plays.
fn compare_candidates(a: &MatchCandidate, b: &MatchCandidate) -> Ordering {
    if (a.score - b.score).abs() > SCORE_EPSILON {
        return a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal);
    }
    a.track
        .is_downloaded()
        .cmp(&b.track.is_downloaded())
        .then(a.track.play_count.cmp(&b.track.play_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::extraction::traits::mocks::{MockSearch, hit};
    use crate::test_utils::mock_track;
    use std::path::PathBuf;

    fn matcher(search: MockSearch) -> (MetadataMatcher, Arc<MemoryCatalog>, Arc<MockSearch>) {
        let catalog = Arc::new(MemoryCatalog::new());
        let search = Arc::new(search);
        let matcher = MetadataMatcher::new(catalog.clone(), search.clone(), MatcherConfig::default());
        (matcher, catalog, search)
    }

    fn yt(id: &str, title: &str, artist: &str, duration: u32) -> Track {
        mock_track(ProviderKind::YouTube, id, title, artist, duration)
    }

    #[tokio::test]
    async fn test_exact_match_beats_near_match() {
        let (matcher, _, search) = matcher(MockSearch::empty());
        let exact = yt("aaaaaaaaaaa", "Yesterday", "The Beatles", 125);
        let near = yt("bbbbbbbbbbb", "Yesterday (Remastered)", "Beatles", 128);
        let query = MatchQuery::new("Yesterday", "The Beatles", Some(125));

        let result = matcher
            .match_track(&query, &[near.clone(), exact.clone()])
            .await
            .unwrap();
        assert_eq!(result.track.id, exact.id);
        assert!(!result.provisional);
        assert_eq!(search.query_count(), 0);

        let (near_score, _) = matcher.score(&query, &near.title, &near.artist, Some(128));
        assert!(result.score > near_score);
    }

    #[tokio::test]
    async fn test_tie_prefers_downloaded_then_play_count() {
        let (matcher, _, _) = matcher(MockSearch::empty());
        let query = MatchQuery::new("Song", "Artist", Some(200));

        let plain = yt("aaaaaaaaaaa", "Song", "Artist", 200);
        let mut played = yt("bbbbbbbbbbb", "Song", "Artist", 200);
        played.play_count = 10;
        let mut downloaded = yt("ccccccccccc", "Song", "Artist", 200);
        downloaded.local_content = Some(PathBuf::from("/music/song.m4a"));

        let best = matcher
            .best_in_pool(&query, &[plain.clone(), played.clone(), downloaded.clone()])
            .unwrap();
        assert_eq!(best.track.id, downloaded.id);

        let best = matcher.best_in_pool(&query, &[played.clone(), plain]).unwrap();
        assert_eq!(best.track.id, played.id);
    }

    #[tokio::test]
    async fn test_unknown_duration_renormalizes() {
        let (matcher, _, _) = matcher(MockSearch::empty());
        let query = MatchQuery::new("Song", "Artist", None);
        let (score, breakdown) = matcher.score(&query, "Song", "Artist", Some(200));
        assert_eq!(breakdown.duration, None);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_duration_term_uses_relative_delta() {
        let (matcher, _, _) = matcher(MockSearch::empty());
        let query = MatchQuery::new("Song", "Artist", Some(200));
        let (score, breakdown) = matcher.score(&query, "Song", "Artist", Some(150));
        assert!((breakdown.duration.unwrap() - 0.75).abs() < 1e-6);
        assert!((score - (0.5 + 0.35 + 0.15 * 0.75)).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_pool_creates_one_provisional_track() {
        let (matcher, catalog, search) = matcher(MockSearch::with_results(vec![
            hit("dQw4w9WgXcQ", "Never Gonna Give You Up", "Rick Astley", Some(213), 1.0),
            hit("xxxxxxxxxxx", "Something Else", "Someone", Some(100), 0.5),
        ]));
        let mut events = catalog.subscribe();
        let query = MatchQuery::new("Never Gonna Give You Up", "Rick Astley", Some(213));

        let result = matcher.match_track(&query, &[]).await.unwrap();
        assert!(result.provisional);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.track.source.track_id, "dQw4w9WgXcQ");
        assert_eq!(search.query_count(), 1);

        // Exactly one insert
        assert_eq!(catalog.list(10).await.unwrap().len(), 1);
        assert!(matches!(events.try_recv(), Ok(crate::catalog::CatalogEvent::Inserted(_))));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_low_scores_fall_back_to_search() {
        let (matcher, _, search) = matcher(MockSearch::with_results(vec![hit(
            "dQw4w9WgXcQ",
            "Wonderwall",
            "Oasis",
            Some(258),
            1.0,
        )]));
        let pool = vec![yt("aaaaaaaaaaa", "Bohemian Rhapsody", "Queen", 355)];
        let query = MatchQuery::new("Wonderwall", "Oasis", Some(258));

        let result = matcher.match_track(&query, &pool).await.unwrap();
        assert!(result.provisional);
        assert_eq!(search.query_count(), 1);
    }

    #[tokio::test]
    async fn test_existing_origin_is_reused() {
        let (matcher, catalog, _) = matcher(MockSearch::with_results(vec![hit(
            "dQw4w9WgXcQ",
            "Never Gonna Give You Up",
            "Rick Astley",
            Some(213),
            1.0,
        )]));
        let existing = yt("dQw4w9WgXcQ", "Never Gonna Give You Up", "Rick Astley", 213);
        catalog.insert(existing.clone()).await.unwrap();

        // Not in the caller's pool, so the search path runs
        let query = MatchQuery::new("Never Gonna Give You Up", "Rick Astley", None);
        let result = matcher.match_track(&query, &[]).await.unwrap();
        assert_eq!(result.track.id, existing.id);
        assert_eq!(catalog.list(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_results_is_error() {
        let (matcher, _, _) = matcher(MockSearch::empty());
        let query = MatchQuery::new("Nothing", "Nobody", None);
        assert!(matches!(
            matcher.match_track(&query, &[]).await,
            Err(MatchError::NoResults(_))
        ));
    }

    #[tokio::test]
    async fn test_search_failure_propagates() {
        let (matcher, _, _) = matcher(MockSearch::with_error(ResolutionError::ProviderUnavailable(
            "all down".into(),
        )));
        let query = MatchQuery::new("Song", "Artist", None);
        assert!(matches!(
            matcher.match_track(&query, &[]).await,
            Err(MatchError::Search(_))
        ));
    }
}
