//! Convert the Spotify embed page to a playlist.

use std::sync::LazyLock;

use regex::Regex;

use super::dto;
use crate::matcher::ImportRow;
use crate::playlist::{Playlist, PlaylistError, UNKNOWN_ARTIST};

static NEXT_DATA: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*\bid="__NEXT_DATA__"[^>]*>(.*?)</script>"#).ok()
});

/// Parse the embed HTML of playlist `playlist_id`.
pub fn parse_embed(html: &str, playlist_id: &str) -> Result<Playlist, PlaylistError> {
    let json = NEXT_DATA
        .as_ref()
        .and_then(|re| re.captures(html))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PlaylistError::Parse("no __NEXT_DATA__ in embed page".into()))?;

    let data: dto::NextData = serde_json::from_str(json).map_err(|e| PlaylistError::Parse(e.to_string()))?;
    let page = data.props.page_props;
    let entity = page
        .state
        .and_then(|s| s.data)
        .and_then(|d| d.entity)
        .or(page.entity)
        .ok_or_else(|| PlaylistError::NotFound(playlist_id.to_string()))?;

    Ok(to_playlist(entity, playlist_id))
}

fn to_playlist(entity: dto::Entity, playlist_id: &str) -> Playlist {
    let name = non_blank(entity.name)
        .or_else(|| non_blank(entity.title))
        .unwrap_or_else(|| "Imported Playlist".to_string());

    let rows = if entity.track_list.is_empty() {
        entity
            .tracks
            .map(|page| page.items.into_iter().filter_map(|i| i.track).filter_map(web_row).collect())
            .unwrap_or_default()
    } else {
        entity.track_list.into_iter().filter_map(embed_row).collect()
    };

    Playlist {
        id: entity.id.unwrap_or_else(|| playlist_id.to_string()),
        name,
        owner: non_blank(entity.subtitle),
        rows,
    }
}

fn embed_row(track: dto::EmbedTrack) -> Option<ImportRow> {
    let title = non_blank(track.title)?;
    let artist = non_blank(track.subtitle.map(|s| s.replace('\u{a0}', " ")))
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
    Some(ImportRow {
        title,
        artist,
        album: None,
        duration_ms: track.duration.filter(|d| *d > 0),
    })
}

fn web_row(track: dto::WebTrack) -> Option<ImportRow> {
    let title = non_blank(track.name)?;
    let artists: Vec<String> = track.artists.into_iter().filter_map(|a| non_blank(a.name)).collect();
    let artist = if artists.is_empty() {
        UNKNOWN_ARTIST.to_string()
    } else {
        artists.join(", ")
    };
    Some(ImportRow {
        title,
        artist,
        album: track.album.and_then(|a| non_blank(a.name)),
        duration_ms: track.duration_ms.filter(|d| *d > 0),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
