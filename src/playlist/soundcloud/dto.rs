//! SoundCloud API v2 playlist Data Transfer Objects
//!
//! These types match EXACTLY what api-v2.soundcloud.com returns from
//! `/resolve` for a set and from `/tracks?ids=`. Only the first few tracks
//! of a set come back complete; the rest are stubs carrying just `id`.
//! DO NOT use these types outside the playlist soundcloud module.

use serde::Deserialize;

/// A set, from `/resolve`
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistResponse {
    pub id: u64,
    /// "playlist" for sets; `/resolve` also answers for users and tracks
    pub kind: Option<String>,
    pub title: Option<String>,
    pub user: Option<User>,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

/// A complete track or a stub
#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    pub id: u64,
    pub title: Option<String>,
    /// Milliseconds
    pub duration: Option<u64>,
    pub user: Option<User>,
    pub publisher_metadata: Option<PublisherMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub username: Option<String>,
}

/// Label-supplied credits, present on some tracks
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherMetadata {
    pub artist: Option<String>,
    pub album_title: Option<String>,
}
