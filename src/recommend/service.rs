//! Recommendation query: similar artists, then provider search per artist.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::RecommendError;
use super::traits::SimilarArtists;
use crate::extraction::{ProviderResult, ProviderSearch, ResolutionError};
use crate::model::{ProviderKind, SourceDescriptor};

/// How wide a recommendation query fans out.
#[derive(Debug, Clone)]
pub struct RecommenderConfig {
    /// Similar artists searched per seed
    pub artists: usize,
    /// Search results kept per similar artist
    pub per_artist: usize,
    pub search_kinds: Vec<ProviderKind>,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            artists: 5,
            per_artist: 3,
            search_kinds: vec![ProviderKind::YouTube, ProviderKind::SoundCloud],
        }
    }
}

/// A provider hit found through a similar artist.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    /// The similar artist whose search produced this hit
    pub via_artist: String,
    pub result: ProviderResult,
}

/// Recommends tracks by artists similar to a seed artist.
pub struct Recommender {
    similar: Arc<dyn SimilarArtists>,
    search: Arc<dyn ProviderSearch>,
    config: RecommenderConfig,
}

impl Recommender {
    pub fn new(
        similar: Arc<dyn SimilarArtists>,
        search: Arc<dyn ProviderSearch>,
        config: RecommenderConfig,
    ) -> Self {
        Self { similar, search, config }
    }

    /// Search providers for `"{artist} songs"` for the top similar artists
    /// of `seed`. Hits are de-duplicated by descriptor, keeping the first.
    ///
    /// A failed search for one artist is skipped; only when every search
    /// fails is the error returned.
    pub async fn for_artist(&self, seed: &str) -> Result<Vec<Recommendation>, RecommendError> {
        let seed = seed.trim();
        let artists: Vec<String> = self
            .similar
            .similar_artists(seed, self.config.artists + 1)
            .await?
            .into_iter()
            .filter(|a| !a.eq_ignore_ascii_case(seed))
            .take(self.config.artists)
            .collect();
        debug!(target: "recommend", %seed, ?artists, "Similar artists");

        let mut seen: HashSet<SourceDescriptor> = HashSet::new();
        let mut recommendations = Vec::new();
        let mut last_error: Option<ResolutionError> = None;
        let mut searched = 0usize;

        for artist in &artists {
            let query = format!("{artist} songs");
            match self
                .search
                .search(&query, &self.config.search_kinds, self.config.per_artist)
                .await
            {
                Ok(results) => {
                    searched += 1;
                    for result in results.into_iter().take(self.config.per_artist) {
                        if seen.insert(result.descriptor.clone()) {
                            recommendations.push(Recommendation {
                                via_artist: artist.clone(),
                                result,
                            });
                        }
                    }
                }
                Err(e) => {
                    warn!(target: "recommend", %artist, error = %e, "Search failed");
                    last_error = Some(e);
                }
            }
        }

        if searched == 0
            && let Some(e) = last_error
        {
            return Err(RecommendError::Search(e));
        }

        info!(
            target: "recommend",
            %seed,
            artists = artists.len(),
            found = recommendations.len(),
            "Recommendations ready"
        );
        Ok(recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::traits::mocks::{MockSearch, hit};
    use crate::recommend::traits::mocks::MockSimilarArtists;

    fn recommender(similar: MockSimilarArtists, search: Arc<MockSearch>, config: RecommenderConfig) -> Recommender {
        Recommender::new(Arc::new(similar), search, config)
    }

    #[tokio::test]
    async fn test_searches_each_similar_artist_and_dedups() {
        let search = Arc::new(MockSearch::with_results(vec![
            hit("aaaaaaaaaaa", "One", "X", Some(200), 1.0),
            hit("bbbbbbbbbbb", "Two", "Y", Some(180), 0.5),
        ]));
        let similar = MockSimilarArtists::new().with("Portishead", &["Massive Attack", "Tricky"]);
        let recommender = recommender(similar, Arc::clone(&search), RecommenderConfig::default());

        let recs = recommender.for_artist("Portishead").await.unwrap();

        assert_eq!(
            *search.queries.lock(),
            vec!["Massive Attack songs".to_string(), "Tricky songs".to_string()]
        );
        // Both searches return the same hits; each descriptor appears once
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.via_artist == "Massive Attack"));
    }

    #[tokio::test]
    async fn test_limits_artists_and_skips_seed() {
        let search = Arc::new(MockSearch::empty());
        let similar = MockSimilarArtists::new().with("Air", &["air", "Phoenix", "Daft Punk", "Justice"]);
        let config = RecommenderConfig {
            artists: 2,
            ..RecommenderConfig::default()
        };
        let recommender = recommender(similar, Arc::clone(&search), config);

        let recs = recommender.for_artist(" Air ").await.unwrap();
        assert!(recs.is_empty());
        assert_eq!(
            *search.queries.lock(),
            vec!["Phoenix songs".to_string(), "Daft Punk songs".to_string()]
        );
    }

    #[tokio::test]
    async fn test_no_similar_artists_is_empty() {
        let search = Arc::new(MockSearch::empty());
        let recommender = recommender(MockSimilarArtists::new(), Arc::clone(&search), RecommenderConfig::default());
        assert!(recommender.for_artist("Nobody").await.unwrap().is_empty());
        assert_eq!(search.query_count(), 0);
    }

    #[tokio::test]
    async fn test_all_searches_failing_is_an_error() {
        let search = Arc::new(MockSearch::with_error(ResolutionError::RateLimited("piped".into())));
        let similar = MockSimilarArtists::new().with("Low", &["Codeine"]);
        let recommender = recommender(similar, search, RecommenderConfig::default());

        let err = recommender.for_artist("Low").await.unwrap_err();
        assert!(matches!(err, RecommendError::Search(ResolutionError::RateLimited(_))));
    }

    #[tokio::test]
    async fn test_lookup_error_propagates() {
        let search = Arc::new(MockSearch::empty());
        let similar = MockSimilarArtists::failing(|| RecommendError::MissingApiKey);
        let recommender = recommender(similar, search, RecommenderConfig::default());
        assert!(matches!(
            recommender.for_artist("Low").await,
            Err(RecommendError::MissingApiKey)
        ));
    }
}
