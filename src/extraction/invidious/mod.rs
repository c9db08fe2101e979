//! Invidious relay backend for YouTube.
//!
//! API docs: https://docs.invidious.io/api/

pub mod dto;
mod adapter;
mod client;

pub use client::{DEFAULT_INSTANCES, InvidiousClient};
