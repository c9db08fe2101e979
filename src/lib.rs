//! Quezic - track resolution, acquisition and playback core.
//!
//! Resolves tracks from YouTube relay frontends and SoundCloud into
//! playable streams, matches imported metadata against the catalog,
//! fetches shared Spotify and SoundCloud playlists for import,
//! downloads tracks in the background and drives a play queue. The
//! binary wraps it in a small CLI; a UI embeds [`app::Services`].

pub mod app;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod db;
pub mod download;
pub mod error;
pub mod events;
pub mod extraction;
pub mod matcher;
pub mod model;
pub mod player;
pub mod playlist;
pub mod recommend;
#[cfg(test)]
pub mod test_utils;
