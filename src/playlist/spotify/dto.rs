//! Spotify embed page Data Transfer Objects
//!
//! These types match EXACTLY the `__NEXT_DATA__` JSON embedded in
//! open.spotify.com/embed/playlist/{id}. The page has carried the entity in
//! two places over time, and tracks either as the embed `trackList` or as a
//! Web API style `tracks.items` page. Every field is optional.
//! DO NOT use these types outside the spotify module.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct NextData {
    pub props: Props,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Props {
    #[serde(rename = "pageProps")]
    pub page_props: PageProps,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageProps {
    pub state: Option<State>,
    pub entity: Option<Entity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct State {
    pub data: Option<StateData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateData {
    pub entity: Option<Entity>,
}

/// The playlist itself
#[derive(Debug, Clone, Deserialize)]
pub struct Entity {
    pub id: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    /// Owner display name in the embed
    pub subtitle: Option<String>,
    #[serde(rename = "trackList", default)]
    pub track_list: Vec<EmbedTrack>,
    pub tracks: Option<TrackPage>,
}

/// One row of the embed track list
#[derive(Debug, Clone, Deserialize)]
pub struct EmbedTrack {
    pub title: Option<String>,
    /// Artists joined with ", " (sometimes with non-breaking spaces)
    pub subtitle: Option<String>,
    /// Milliseconds
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackPage {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    /// `null` for removed tracks
    pub track: Option<WebTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebTrack {
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Vec<Named>,
    pub album: Option<Named>,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Named {
    pub name: Option<String>,
}
