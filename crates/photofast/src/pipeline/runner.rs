//! Drives items through lease, decision, compression and reporting.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use log::{error, warn};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::batch::{BatchAggregator, CompressionRecord, ReportSink};
use crate::cache::MetadataCache;
use crate::config::{PolicyConfig, SettingsStore};
use crate::decision::{DecisionEngine, SkipReason};
use crate::dedup::{DedupTracker, LeaseGuard};
use crate::error::BatchError;
use crate::media::{Compressor, MarkerStore, MediaIndex, MediaItem};

/// One long-lived instance per process; all shared state (live batches,
/// leases, cache) is owned here and handed to callers by reference.
pub struct CompressionPipeline {
    index: Arc<dyn MediaIndex>,
    markers: Arc<dyn MarkerStore>,
    compressor: Arc<dyn Compressor>,
    settings: Arc<SettingsStore>,
    cache: Arc<MetadataCache>,
    dedup: Arc<DedupTracker>,
    engine: Arc<DecisionEngine>,
    aggregator: Arc<BatchAggregator>,
}

impl CompressionPipeline {
    pub fn new(
        index: Arc<dyn MediaIndex>,
        markers: Arc<dyn MarkerStore>,
        compressor: Arc<dyn Compressor>,
        sink: Arc<dyn ReportSink>,
        settings: Arc<SettingsStore>,
        policy: PolicyConfig,
    ) -> Self {
        let cache = Arc::new(MetadataCache::new(policy.cache_capacity));
        let dedup = Arc::new(DedupTracker::new(Duration::from_secs(
            policy.lease_timeout_secs,
        )));
        let aggregator = BatchAggregator::new(sink, &policy);
        let engine = Arc::new(DecisionEngine::new(
            Arc::clone(&index),
            Arc::clone(&markers),
            Arc::clone(&settings),
            Arc::clone(&cache),
            policy,
        ));

        Self {
            index,
            markers,
            compressor,
            settings,
            cache,
            dedup,
            engine,
            aggregator,
        }
    }

    pub fn engine(&self) -> &Arc<DecisionEngine> {
        &self.engine
    }

    pub fn aggregator(&self) -> &Arc<BatchAggregator> {
        &self.aggregator
    }

    pub fn dedup(&self) -> &Arc<DedupTracker> {
        &self.dedup
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    /// Processes a user multi-select: one bounded batch, one concurrent
    /// task per item, a single consolidated report at the end. Selection
    /// overrides the auto-compression toggle.
    pub async fn process_selection(&self, items: Vec<MediaItem>, owner: &str) -> String {
        let batch_id = self.aggregator.create_bounded(owner, items.len());
        let run_id = Uuid::new_v4();
        let span = info_span!("process_selection",
            run_id = %run_id,
            owner,
            count = items.len(),
        );

        async {
            let prefetched = match self.index.prefetch(&items).await {
                Ok(facts) => facts,
                Err(e) => {
                    warn!("Prefetch failed, resolving names per item: {}", e);
                    Default::default()
                }
            };
            let limit = self.settings.snapshot().worker_count.max(1);

            stream::iter(items)
                .for_each_concurrent(limit, |item| {
                    let name_hint = prefetched
                        .get(&item)
                        .and_then(|facts| facts.display_name.clone());
                    let batch_id = batch_id.clone();
                    async move {
                        self.process_into_batch(&item, name_hint, &batch_id, owner, true)
                            .await;
                    }
                })
                .await;
        }
        .instrument(span)
        .await;

        batch_id
    }

    /// Processes one item from a change notification or retried
    /// background job. Results land in the owner's rolling open batch so
    /// a burst of detections becomes one report.
    pub async fn process_detected(&self, item: MediaItem, owner: &str) -> String {
        let batch_id = self.aggregator.open_batch(owner);
        let span = info_span!("process_detected", item = %item, owner);
        self.process_into_batch(&item, None, &batch_id, owner, false)
            .instrument(span)
            .await;
        batch_id
    }

    /// Records an externally produced outcome into a batch. If the batch
    /// finalized in the meantime, the result is routed into a fresh open
    /// batch instead of being dropped.
    pub fn record_outcome(&self, batch_id: &str, owner: &str, record: CompressionRecord) {
        if let Err(BatchError::UnknownBatch(_)) = self.aggregator.add_result(batch_id, record.clone())
        {
            warn!(
                "Batch {} already finalized, routing result for {} into a fresh batch",
                batch_id, record.file_name
            );
            let fallback = self.aggregator.open_batch(owner);
            if let Err(e) = self.aggregator.add_result(&fallback, record) {
                error!("Failed to record result into fallback batch: {}", e);
            }
        }
    }

    async fn process_into_batch(
        &self,
        item: &MediaItem,
        name_hint: Option<String>,
        batch_id: &str,
        owner: &str,
        force: bool,
    ) {
        let name = match name_hint {
            Some(name) => name,
            None => match self.index.display_name(item).await {
                Ok(Some(name)) => name,
                _ => item.key().to_string(),
            },
        };

        // The lease guard releases on drop, so a cancelled task cannot
        // keep the item claimed for the full timeout.
        let record = match LeaseGuard::acquire(&self.dedup, item.key()) {
            None => CompressionRecord::skipped(&name, SkipReason::ItemBeingProcessed),
            Some(_lease) => self.run_item(item, &name, force).await,
        };

        self.record_outcome(batch_id, owner, record);
    }

    async fn run_item(&self, item: &MediaItem, name: &str, force: bool) -> CompressionRecord {
        let decision = self.engine.evaluate(item, force).await;
        if !decision.proceed {
            return CompressionRecord::skipped(name, decision.reason);
        }

        let quality = self.settings.quality();
        if !decision.requires_compression() {
            // Messenger photo: stamp the marker so the item is
            // recognized downstream, skip the re-encode itself.
            self.stamp_marker(item, quality).await;
            return CompressionRecord::skipped(name, decision.reason);
        }

        let original_size = match self.index.size(item).await {
            Ok(size) => size,
            Err(e) => {
                warn!("Could not read size of {}: {}", item, e);
                0
            }
        };

        match self.compressor.compress(item, quality).await {
            Ok(Some(outcome)) => {
                self.stamp_marker(&outcome.output, quality).await;
                self.cache.invalidate(item.key());
                CompressionRecord::compressed(name, original_size, outcome.output_size)
            }
            Ok(None) => {
                // Executor declined: the file would not shrink enough.
                CompressionRecord::skipped(name, SkipReason::AlreadySmall)
            }
            Err(e) => {
                error!("Compression of {} failed: {}", item, e);
                CompressionRecord::failed(name, original_size, &e.to_string())
            }
        }
    }

    async fn stamp_marker(&self, item: &MediaItem, quality: u8) {
        match self.markers.write_marker(item, quality).await {
            Ok(true) => {
                self.cache.invalidate(item.key());
            }
            Ok(false) => warn!("Marker write declined for {}", item),
            Err(e) => warn!("Marker write failed for {}: {}", item, e),
        }
    }
}
