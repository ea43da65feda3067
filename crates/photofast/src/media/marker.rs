//! Compression marker persistence and payload format.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MediaError;

use super::item::MediaItem;

/// Prefix identifying a compression marker payload in a metadata
/// comment field.
pub const MARKER_PREFIX: &str = "COMPRESSEDBYPHOTOFAST";

/// A compression marker read back from an item's metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionMarker {
    pub present: bool,
    pub quality: u8,
    /// When the marker was written, in milliseconds since the epoch.
    pub timestamp_ms: i64,
}

impl CompressionMarker {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn new(quality: u8, timestamp_ms: i64) -> Self {
        Self {
            present: true,
            quality,
            timestamp_ms,
        }
    }

    /// Serializes the marker as `<prefix>:<quality>:<millis>`, the form
    /// stored in the metadata comment field.
    pub fn to_payload(&self) -> String {
        format!("{}:{}:{}", MARKER_PREFIX, self.quality, self.timestamp_ms)
    }

    /// Parses a metadata comment payload. Returns an absent marker for
    /// anything that does not carry the expected prefix or shape.
    pub fn parse_payload(payload: &str) -> Self {
        let mut parts = payload.splitn(3, ':');
        if parts.next() != Some(MARKER_PREFIX) {
            return Self::absent();
        }
        let quality = parts.next().and_then(|q| q.parse::<u8>().ok());
        let timestamp_ms = parts.next().and_then(|t| t.parse::<i64>().ok());
        match (quality, timestamp_ms) {
            (Some(quality), Some(timestamp_ms)) => Self::new(quality, timestamp_ms),
            _ => Self::absent(),
        }
    }
}

/// Read/write access to compression markers on media items.
///
/// Implemented outside the core (EXIF comment fields on the platform,
/// in-memory map in tests).
#[async_trait]
pub trait MarkerStore: Send + Sync {
    /// Reads the marker for an item; absent markers are a normal result,
    /// not an error.
    async fn read_marker(&self, item: &MediaItem) -> Result<CompressionMarker, MediaError>;

    /// Stamps a marker with the given quality and the current time.
    /// Returns false if the underlying metadata could not be written.
    async fn write_marker(&self, item: &MediaItem, quality: u8) -> Result<bool, MediaError>;
}
