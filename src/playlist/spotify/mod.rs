//! Spotify public playlists through the embed page.

mod adapter;
mod client;
pub mod dto;

pub use client::{DEFAULT_EMBED_URL, SpotifyEmbedClient, playlist_id};
