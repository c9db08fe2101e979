//! Trait seam for playlist services.

use async_trait::async_trait;

use super::{Playlist, PlaylistError};

/// A service that can list the tracks of a shared playlist.
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    fn name(&self) -> &str;

    /// Whether `url` points at a playlist of this service.
    fn accepts(&self, url: &str) -> bool;

    async fn fetch(&self, url: &str) -> Result<Playlist, PlaylistError>;
}
