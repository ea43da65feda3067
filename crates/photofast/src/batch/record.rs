use serde::{Deserialize, Serialize};

use crate::decision::SkipReason;

/// Outcome of one finished compression attempt, appended into a batch.
/// Never mutated after append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionRecord {
    pub file_name: String,
    pub original_size: u64,
    pub compressed_size: u64,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Failure marker: a failed attempt is recorded with `skipped =
    /// false` and this set, so report counts are never silently short.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompressionRecord {
    pub fn compressed(file_name: &str, original_size: u64, compressed_size: u64) -> Self {
        Self {
            file_name: file_name.to_string(),
            original_size,
            compressed_size,
            skipped: false,
            skip_reason: None,
            error: None,
        }
    }

    pub fn skipped(file_name: &str, reason: SkipReason) -> Self {
        Self {
            file_name: file_name.to_string(),
            original_size: 0,
            compressed_size: 0,
            skipped: true,
            skip_reason: Some(reason.as_str().to_string()),
            error: None,
        }
    }

    pub fn failed(file_name: &str, original_size: u64, error: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            original_size,
            compressed_size: 0,
            skipped: false,
            skip_reason: None,
            error: Some(error.to_string()),
        }
    }

    pub fn succeeded(&self) -> bool {
        !self.skipped && self.error.is_none()
    }

    pub fn size_reduction_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        let saved = self.original_size.saturating_sub(self.compressed_size);
        saved as f64 / self.original_size as f64 * 100.0
    }
}
