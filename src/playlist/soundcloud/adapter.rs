//! Convert SoundCloud set DTOs to a playlist.

use std::collections::HashMap;

use super::dto;
use crate::matcher::ImportRow;
use crate::playlist::{Playlist, UNKNOWN_ARTIST};

/// Ids of tracks that came back as stubs, in set order.
pub fn stub_ids(set: &dto::PlaylistResponse) -> Vec<u64> {
    set.tracks
        .iter()
        .filter(|t| t.title.is_none())
        .map(|t| t.id)
        .collect()
}

/// Build the playlist, filling stubs from `full`. Tracks still missing a
/// title or a duration are skipped.
pub fn to_playlist(set: dto::PlaylistResponse, full: Vec<dto::Track>) -> Playlist {
    let mut full: HashMap<u64, dto::Track> = full.into_iter().map(|t| (t.id, t)).collect();

    let rows = set
        .tracks
        .into_iter()
        .map(|t| match t.title {
            Some(_) => t,
            None => full.remove(&t.id).unwrap_or(t),
        })
        .filter_map(to_row)
        .collect();

    Playlist {
        id: set.id.to_string(),
        name: non_blank(set.title).unwrap_or_else(|| "SoundCloud Playlist".to_string()),
        owner: set.user.and_then(|u| non_blank(u.username)),
        rows,
    }
}

fn to_row(track: dto::Track) -> Option<ImportRow> {
    let title = non_blank(track.title)?;
    let duration_ms = track.duration.filter(|d| *d > 0)?;
    let (credited, album) = match track.publisher_metadata {
        Some(meta) => (non_blank(meta.artist), non_blank(meta.album_title)),
        None => (None, None),
    };
    let artist = credited
        .or_else(|| track.user.and_then(|u| non_blank(u.username)))
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

    Some(ImportRow {
        title,
        artist,
        album,
        duration_ms: Some(duration_ms),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: u64, title: Option<&str>, duration: Option<u64>, user: Option<&str>) -> dto::Track {
        dto::Track {
            id,
            title: title.map(String::from),
            duration,
            user: user.map(|u| dto::User {
                username: Some(u.to_string()),
            }),
            publisher_metadata: None,
        }
    }

    fn set(tracks: Vec<dto::Track>) -> dto::PlaylistResponse {
        dto::PlaylistResponse {
            id: 1001,
            kind: Some("playlist".into()),
            title: Some("Summer Mix".into()),
            user: None,
            tracks,
        }
    }

    #[test]
    fn test_stubs_are_filled_in_set_order() {
        let set = set(vec![
            track(1, Some("One"), Some(200_000), Some("a")),
            track(2, None, None, None),
            track(3, None, None, None),
        ]);
        assert_eq!(stub_ids(&set), vec![2, 3]);

        let full = vec![
            track(3, Some("Three"), Some(180_000), Some("c")),
            track(2, Some("Two"), Some(190_000), Some("b")),
        ];
        let playlist = to_playlist(set, full);
        let titles: Vec<&str> = playlist.rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["One", "Two", "Three"]);
        assert_eq!(playlist.rows[1].artist, "b");
        assert_eq!(playlist.id, "1001");
    }

    #[test]
    fn test_unresolved_and_zero_length_tracks_are_skipped() {
        let playlist = to_playlist(
            set(vec![
                track(1, Some("Snippet"), Some(0), Some("a")),
                track(2, None, None, None),
                track(3, Some("Kept"), Some(1000), None),
            ]),
            Vec::new(),
        );
        assert_eq!(playlist.rows.len(), 1);
        assert_eq!(playlist.rows[0].artist, UNKNOWN_ARTIST);
    }

    #[test]
    fn test_publisher_artist_wins_over_uploader() {
        let mut credited = track(1, Some("Sunrise"), Some(241_000), Some("label-uploads"));
        credited.publisher_metadata = Some(dto::PublisherMetadata {
            artist: Some("The Producer".into()),
            album_title: Some("Dawn".into()),
        });
        let playlist = to_playlist(set(vec![credited]), Vec::new());
        assert_eq!(playlist.rows[0].artist, "The Producer");
        assert_eq!(playlist.rows[0].album.as_deref(), Some("Dawn"));
    }
}
