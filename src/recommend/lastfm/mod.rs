//! Last.fm similar-artist lookups.

mod adapter;
mod client;
pub mod dto;

pub use client::{DEFAULT_API_URL, LastFmClient};
