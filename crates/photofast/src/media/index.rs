use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::MediaError;

use super::facts::ItemFacts;
use super::item::MediaItem;

/// Read access to the host's media library.
///
/// Implemented outside the core (platform media store, filesystem
/// walker, test double). All calls may block on I/O and are therefore
/// async; the decision engine awaits them off any UI-facing thread.
#[async_trait]
pub trait MediaIndex: Send + Sync {
    /// True if the item still resolves to readable content.
    async fn exists(&self, item: &MediaItem) -> Result<bool, MediaError>;

    async fn display_name(&self, item: &MediaItem) -> Result<Option<String>, MediaError>;

    async fn path(&self, item: &MediaItem) -> Result<Option<String>, MediaError>;

    async fn mime_type(&self, item: &MediaItem) -> Result<Option<String>, MediaError>;

    async fn size(&self, item: &MediaItem) -> Result<u64, MediaError>;

    /// Last-modified timestamp in milliseconds, if the source has one.
    async fn modified_at_ms(&self, item: &MediaItem) -> Result<Option<i64>, MediaError>;

    /// True while the owning app has the item flagged as still being
    /// written.
    async fn is_pending(&self, item: &MediaItem) -> Result<bool, MediaError>;

    async fn is_screenshot(&self, item: &MediaItem) -> Result<bool, MediaError>;

    /// Resolves all attributes for many items in one call.
    async fn prefetch(
        &self,
        items: &[MediaItem],
    ) -> Result<HashMap<MediaItem, ItemFacts>, MediaError>;

    /// True if a file with the given name already exists in the named
    /// library directory. Used to detect previously written outputs.
    async fn contains_file(
        &self,
        directory_name: &str,
        file_name: &str,
    ) -> Result<bool, MediaError>;
}
