//! Convert Last.fm DTOs to recommendation types.

use super::dto;

/// Artist names, best match first. Blank names are dropped.
pub fn to_artist_names(response: dto::SimilarArtistsResponse) -> Vec<String> {
    let mut artists: Vec<(f32, String)> = response
        .similarartists
        .artist
        .into_iter()
        .filter(|a| !a.name.trim().is_empty())
        .map(|a| {
            let score = a
                .match_score
                .as_deref()
                .and_then(|s| s.parse::<f32>().ok())
                .unwrap_or(0.0);
            (score, a.name.trim().to_string())
        })
        .collect();

    // Stable: equal scores keep Last.fm's order
    artists.sort_by(|a, b| b.0.total_cmp(&a.0));
    artists.into_iter().map(|(_, name)| name).collect()
}
