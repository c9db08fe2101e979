//! Stream extraction: turning a [`SourceDescriptor`] into a fetchable stream.
//!
//! # Architecture
//!
//! - **domain.rs**: Our internal types (routing, streams, errors)
//! - **traits.rs**: Seams used by the player, downloader and matcher
//! - **transport.rs**: Per-route HTTP clients and status mapping
//! - **resolver.rs**: Fallback across backends, instances and routes
//! - **piped/**, **invidious/**: Relay frontends for YouTube
//! - **soundcloud/**: Direct SoundCloud API
//!
//! Each provider module has the same layout:
//! - `client.rs` - HTTP communication
//! - `dto.rs` - API response types (match the API exactly)
//! - `adapter.rs` - Convert DTOs to domain types
//!
//! [`SourceDescriptor`]: crate::model::SourceDescriptor

pub mod domain;
pub mod ids;
pub mod invidious;
pub mod piped;
pub mod resolver;
pub mod soundcloud;
pub mod traits;
pub mod transport;

pub use domain::{
    AudioFormat, Instance, ProviderResult, ResolutionError, ResolutionErrorKind, ResolutionRequest,
    ResolvedStream, Route, RouteConfig, RoutingHandle, RoutingPolicy, StreamIntent, StreamPreferences,
    StreamQuality,
};
pub use resolver::{ExtractionResolver, ProviderChain};
pub use traits::{ProviderClient, ProviderSearch, StreamResolver};
