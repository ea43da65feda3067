use serde::{Deserialize, Serialize};

/// Attributes of a media item as reported by the media index.
///
/// Returned by the batch-prefetch call so a multi-select run resolves
/// everything in one round trip instead of one query per attribute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFacts {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub size: u64,
    /// Last-modified timestamp in milliseconds since the epoch, when the
    /// source reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at_ms: Option<i64>,
    /// True while the owning app is still writing the file.
    pub pending: bool,
    pub screenshot: bool,
}
