//! Groups concurrent compression outcomes into reportable batches.
//!
//! Batches come in two shapes. A bounded batch is opened by a caller
//! that knows how many results to expect (multi-select) and finalizes
//! on the last one, with a safety timeout in case some never arrive. An
//! open batch collects results from independent triggers (change
//! events, background retries) and closes after an inactivity window.
//! Either way exactly one report leaves per finalized batch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::PolicyConfig;
use crate::error::BatchError;

use super::record::CompressionRecord;
use super::report::ReportSink;

struct LiveBatch {
    owner: String,
    /// Expected result count; `None` marks an open-ended batch.
    expected: Option<usize>,
    records: Vec<CompressionRecord>,
    /// Bumped on every append so a stale inactivity timer that fires
    /// concurrently with an append cannot finalize the batch.
    epoch: u64,
    last_touched: Instant,
    timer: Option<JoinHandle<()>>,
}

impl LiveBatch {
    fn cancel_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }
}

pub struct BatchAggregator {
    /// Handle to ourselves for the timer tasks; does not keep the
    /// aggregator alive past its last external reference.
    weak_self: Weak<Self>,
    batches: Mutex<HashMap<String, LiveBatch>>,
    sequence: AtomicU64,
    sink: Arc<dyn ReportSink>,
    bounded_timeout: Duration,
    open_window: Duration,
    max_live_batches: usize,
    batch_max_age: Duration,
}

impl BatchAggregator {
    pub fn new(sink: Arc<dyn ReportSink>, policy: &PolicyConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            batches: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            sink,
            bounded_timeout: Duration::from_secs(policy.bounded_batch_timeout_secs),
            open_window: Duration::from_secs(policy.open_batch_window_secs),
            max_live_batches: policy.max_live_batches,
            batch_max_age: Duration::from_secs(policy.batch_max_age_secs),
        })
    }

    /// Opens a batch that finalizes once `expected_count` results have
    /// been appended, or when the safety timeout fires first.
    pub fn create_bounded(&self, owner: &str, expected_count: usize) -> String {
        let batch_id = self.next_batch_id();
        let timer = self.spawn_timer(&batch_id, self.bounded_timeout, None);

        let mut batches = self.lock_batches();
        batches.insert(
            batch_id.clone(),
            LiveBatch {
                owner: owner.to_string(),
                expected: Some(expected_count),
                records: Vec::with_capacity(expected_count),
                epoch: 0,
                last_touched: Instant::now(),
                timer: Some(timer),
            },
        );
        debug!(
            "Opened bounded batch {} expecting {} results",
            batch_id, expected_count
        );
        self.prune_locked(&mut batches);
        batch_id
    }

    /// Returns the open batch for this owner if one was touched within
    /// the inactivity window, otherwise opens a new one.
    pub fn open_batch(&self, owner: &str) -> String {
        let mut batches = self.lock_batches();

        let reusable = batches
            .iter()
            .filter(|(_, batch)| {
                batch.expected.is_none()
                    && batch.owner == owner
                    && batch.last_touched.elapsed() < self.open_window
            })
            .max_by_key(|(_, batch)| batch.last_touched)
            .map(|(id, _)| id.clone());
        if let Some(batch_id) = reusable {
            return batch_id;
        }

        let batch_id = self.next_batch_id();
        let timer = self.spawn_timer(&batch_id, self.open_window, Some(0));
        batches.insert(
            batch_id.clone(),
            LiveBatch {
                owner: owner.to_string(),
                expected: None,
                records: Vec::new(),
                epoch: 0,
                last_touched: Instant::now(),
                timer: Some(timer),
            },
        );
        debug!("Opened auto batch {}", batch_id);
        self.prune_locked(&mut batches);
        batch_id
    }

    /// Appends a result. A bounded batch that reaches its expected count
    /// finalizes immediately; an open batch gets its inactivity window
    /// reset. Results for ids no longer live are rejected; the caller
    /// decides whether to drop them or route them into a fresh batch.
    pub fn add_result(
        &self,
        batch_id: &str,
        record: CompressionRecord,
    ) -> Result<(), BatchError> {
        let finalized = {
            let mut batches = self.lock_batches();
            let Some(batch) = batches.get_mut(batch_id) else {
                return Err(BatchError::UnknownBatch(batch_id.to_string()));
            };

            batch.records.push(record);
            batch.epoch += 1;
            batch.last_touched = Instant::now();

            let complete = match batch.expected {
                Some(expected) => batch.records.len() >= expected,
                None => {
                    // Reset the inactivity window.
                    batch.cancel_timer();
                    let epoch = batch.epoch;
                    batch.timer = Some(self.spawn_timer(batch_id, self.open_window, Some(epoch)));
                    false
                }
            };

            if complete {
                batches.remove(batch_id)
            } else {
                None
            }
        };

        if let Some(batch) = finalized {
            batch.cancel_timer();
            self.emit(batch_id, batch);
        }
        Ok(())
    }

    /// Finalizes a batch regardless of completeness. Returns false if
    /// the batch was already gone; a second call is a no-op.
    pub fn force_finalize(&self, batch_id: &str) -> bool {
        let finalized = self.lock_batches().remove(batch_id);
        match finalized {
            Some(batch) => {
                batch.cancel_timer();
                self.emit(batch_id, batch);
                true
            }
            None => false,
        }
    }

    /// Removes abandoned batches without reporting. Only acts when the
    /// live set exceeds the cap; candidates are batches older (by the
    /// timestamp decoded from their id) than the maximum age.
    pub fn cleanup_old_batches(&self) -> usize {
        let mut batches = self.lock_batches();
        self.prune_locked(&mut batches)
    }

    pub fn is_live(&self, batch_id: &str) -> bool {
        self.lock_batches().contains_key(batch_id)
    }

    pub fn live_count(&self) -> usize {
        self.lock_batches().len()
    }

    /// Extracts the creation timestamp embedded in a batch id.
    pub fn decode_created_at_ms(batch_id: &str) -> Option<i64> {
        batch_id.rsplit('_').next()?.parse().ok()
    }

    fn next_batch_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("batch_{}_{}", seq, Utc::now().timestamp_millis())
    }

    fn lock_batches(&self) -> MutexGuard<'_, HashMap<String, LiveBatch>> {
        match self.batches.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Batch map lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Schedules a finalize after `timeout`. For open batches the
    /// current epoch is captured so a timer that lost a race against an
    /// append does nothing.
    fn spawn_timer(
        &self,
        batch_id: &str,
        timeout: Duration,
        expected_epoch: Option<u64>,
    ) -> JoinHandle<()> {
        let weak = self.weak_self.clone();
        let batch_id = batch_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(aggregator) = weak.upgrade() {
                aggregator.finalize_from_timer(&batch_id, expected_epoch);
            }
        })
    }

    fn finalize_from_timer(&self, batch_id: &str, expected_epoch: Option<u64>) {
        let finalized = {
            let mut batches = self.lock_batches();
            let matches = batches
                .get(batch_id)
                .map(|batch| expected_epoch.map_or(true, |epoch| batch.epoch == epoch))
                .unwrap_or(false);
            if matches {
                batches.remove(batch_id)
            } else {
                None
            }
        };

        if let Some(batch) = finalized {
            debug!("Batch {} finalized by timeout", batch_id);
            batch.cancel_timer();
            self.emit(batch_id, batch);
        }
    }

    /// Must hold the batch lock. Returns the number of pruned batches.
    fn prune_locked(&self, batches: &mut HashMap<String, LiveBatch>) -> usize {
        if batches.len() <= self.max_live_batches {
            return 0;
        }

        let now_ms = Utc::now().timestamp_millis();
        let max_age_ms = self.batch_max_age.as_millis() as i64;
        let abandoned: Vec<String> = batches
            .iter()
            .filter(|(id, _)| {
                Self::decode_created_at_ms(id)
                    .map(|created| now_ms - created >= max_age_ms)
                    .unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &abandoned {
            if let Some(batch) = batches.remove(id) {
                batch.cancel_timer();
                warn!("Pruned abandoned batch {} without report", id);
            }
        }
        abandoned.len()
    }

    /// Emits exactly one report for a finalized batch. Zero records
    /// produce no report; a lone non-skipped record is reported
    /// individually; everything else aggregates.
    fn emit(&self, batch_id: &str, batch: LiveBatch) {
        if batch.records.is_empty() {
            debug!("Batch {} closed empty, no report", batch_id);
            return;
        }
        if batch.records.len() == 1 && !batch.records[0].skipped {
            self.sink
                .emit_individual(batch_id, &batch.owner, &batch.records[0]);
        } else {
            self.sink.emit_aggregate(
                batch_id,
                &batch.owner,
                &batch.records,
                batch.expected.is_some(),
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn insert_batch_for_test(
        &self,
        batch_id: &str,
        owner: &str,
        expected: Option<usize>,
    ) {
        self.lock_batches().insert(
            batch_id.to_string(),
            LiveBatch {
                owner: owner.to_string(),
                expected,
                records: Vec::new(),
                epoch: 0,
                last_touched: Instant::now(),
                timer: None,
            },
        );
    }
}
