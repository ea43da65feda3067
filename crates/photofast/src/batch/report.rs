//! Report types and the broadcast channel they are emitted on.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::util::format_size;

use super::record::CompressionRecord;

/// Aggregate numbers over a batch's records.
///
/// Sizes only accumulate over succeeded records, so the saved
/// percentage reflects actual compressions.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub original_size_total: u64,
    pub compressed_size_total: u64,
    pub skip_reasons: HashMap<String, usize>,
}

impl ReportSummary {
    pub fn from_records(records: &[CompressionRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.total += 1;
            if record.skipped {
                summary.skipped += 1;
                if let Some(reason) = &record.skip_reason {
                    *summary.skip_reasons.entry(reason.clone()).or_insert(0) += 1;
                }
            } else if record.succeeded() {
                summary.succeeded += 1;
                summary.original_size_total += record.original_size;
                summary.compressed_size_total += record.compressed_size;
            } else {
                summary.failed += 1;
            }
        }
        summary
    }

    pub fn saved_bytes(&self) -> u64 {
        self.original_size_total
            .saturating_sub(self.compressed_size_total)
    }

    pub fn saved_percent(&self) -> f64 {
        if self.original_size_total == 0 {
            return 0.0;
        }
        self.saved_bytes() as f64 / self.original_size_total as f64 * 100.0
    }

    pub fn all_skipped(&self) -> bool {
        self.total > 0 && self.skipped == self.total
    }

    /// One-line human description used by log output.
    pub fn describe(&self) -> String {
        if self.all_skipped() {
            return format!("All {} photos skipped", self.total);
        }
        let mut line = format!(
            "Compressed {} of {} photos: {} -> {} ({:.1}% saved)",
            self.succeeded,
            self.total,
            format_size(self.original_size_total),
            format_size(self.compressed_size_total),
            self.saved_percent(),
        );
        if self.skipped > 0 {
            line.push_str(&format!(", {} skipped", self.skipped));
        }
        if self.failed > 0 {
            line.push_str(&format!(", {} failed", self.failed));
        }
        line
    }
}

/// A consolidated message for one finalized batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BatchReport {
    /// Exactly one non-skipped result: reported like a single file.
    #[serde(rename_all = "camelCase")]
    Individual {
        batch_id: String,
        owner: String,
        record: CompressionRecord,
    },
    /// Everything else: one combined message.
    #[serde(rename_all = "camelCase")]
    Aggregate {
        batch_id: String,
        owner: String,
        bounded: bool,
        summary: ReportSummary,
        records: Vec<CompressionRecord>,
    },
}

/// Consumes finalized batches. Rendering (toast, notification) is the
/// subscriber's concern.
pub trait ReportSink: Send + Sync {
    fn emit_individual(&self, batch_id: &str, owner: &str, record: &CompressionRecord);

    fn emit_aggregate(
        &self,
        batch_id: &str,
        owner: &str,
        records: &[CompressionRecord],
        bounded: bool,
    );
}

/// Default sink: posts reports onto a broadcast channel so notification
/// consumers pick them up without blocking the finalizing task.
#[derive(Clone)]
pub struct ReportBroadcaster {
    sender: Arc<broadcast::Sender<BatchReport>>,
}

impl ReportBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchReport> {
        self.sender.subscribe()
    }

    fn send(&self, report: BatchReport) {
        // No active receivers is fine.
        let _ = self.sender.send(report);
    }
}

impl Default for ReportBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ReportSink for ReportBroadcaster {
    fn emit_individual(&self, batch_id: &str, owner: &str, record: &CompressionRecord) {
        log::info!(
            "Batch {} finished: {} ({:.1}% saved)",
            batch_id,
            record.file_name,
            record.size_reduction_percent()
        );
        self.send(BatchReport::Individual {
            batch_id: batch_id.to_string(),
            owner: owner.to_string(),
            record: record.clone(),
        });
    }

    fn emit_aggregate(
        &self,
        batch_id: &str,
        owner: &str,
        records: &[CompressionRecord],
        bounded: bool,
    ) {
        let summary = ReportSummary::from_records(records);
        log::info!("Batch {} finished: {}", batch_id, summary.describe());
        self.send(BatchReport::Aggregate {
            batch_id: batch_id.to_string(),
            owner: owner.to_string(),
            bounded,
            summary,
            records: records.to_vec(),
        });
    }
}
