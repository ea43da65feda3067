use serde::{Deserialize, Serialize};

/// Why an item does not need a compression run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    None,
    BasicCheckFailed,
    InAppDirectory,
    CompressedVersionExists,
    AlreadyCompressed,
    AlreadySmall,
    MessengerPhoto,
    ItemBeingProcessed,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::None => "none",
            SkipReason::BasicCheckFailed => "basic_check_failed",
            SkipReason::InAppDirectory => "in_app_directory",
            SkipReason::CompressedVersionExists => "compressed_version_exists",
            SkipReason::AlreadyCompressed => "already_compressed",
            SkipReason::AlreadySmall => "already_small",
            SkipReason::MessengerPhoto => "messenger_photo",
            SkipReason::ItemBeingProcessed => "item_being_processed",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one decision evaluation. Created fresh per call and never
/// persisted beyond it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionResult {
    /// Whether a worker run is warranted for this item.
    pub proceed: bool,
    pub reason: SkipReason,
    pub has_marker: bool,
    pub marker_quality: u8,
    pub marker_timestamp_ms: i64,
    pub item_modified_at_ms: Option<i64>,
    /// Present when evaluation degraded after a collaborator error.
    pub error: Option<String>,
}

impl DecisionResult {
    pub(crate) fn skip(reason: SkipReason) -> Self {
        Self {
            proceed: false,
            reason,
            has_marker: false,
            marker_quality: 0,
            marker_timestamp_ms: 0,
            item_modified_at_ms: None,
            error: None,
        }
    }

    pub(crate) fn proceed() -> Self {
        Self {
            proceed: true,
            reason: SkipReason::None,
            has_marker: false,
            marker_quality: 0,
            marker_timestamp_ms: 0,
            item_modified_at_ms: None,
            error: None,
        }
    }

    /// True if the pixel recompression itself should run.
    ///
    /// Messenger photos keep `proceed = true` so the worker still stamps
    /// metadata, while the actual re-encode is suppressed.
    pub fn requires_compression(&self) -> bool {
        self.proceed && self.reason != SkipReason::MessengerPhoto
    }
}
