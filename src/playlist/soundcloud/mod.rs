//! SoundCloud sets through API v2.

mod adapter;
mod client;
pub mod dto;

pub use client::{SoundCloudPlaylistClient, is_playlist_url};
