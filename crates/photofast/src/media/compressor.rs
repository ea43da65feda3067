use async_trait::async_trait;

use crate::error::MediaError;

use super::item::MediaItem;

/// Result of a successful compression run.
#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    /// Handle of the written output (same as the input in replace mode).
    pub output: MediaItem,
    pub output_size: u64,
}

/// The pixel-level re-encoding executor.
///
/// The core never calls this directly from the decision engine; the
/// pipeline invokes it once a decision says proceed and only consumes
/// the outcome.
#[async_trait]
pub trait Compressor: Send + Sync {
    /// Re-encodes the item at the given quality. `Ok(None)` means the
    /// executor declined (e.g. compression would not shrink the file);
    /// errors are real failures.
    async fn compress(
        &self,
        item: &MediaItem,
        quality: u8,
    ) -> Result<Option<CompressionOutcome>, MediaError>;
}
