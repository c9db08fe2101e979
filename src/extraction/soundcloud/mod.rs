//! SoundCloud direct backend.

pub mod dto;
mod adapter;
mod client;

pub use client::{DEFAULT_API_URL, SoundCloudClient};
