//! Piped relay backend for YouTube.
//!
//! API docs: https://docs.piped.video/docs/api-documentation/

pub mod dto;
mod adapter;
mod client;

pub use client::{DEFAULT_INSTANCES, PipedClient};
