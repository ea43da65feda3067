//! Self-expiring per-item leases against duplicate concurrent work.
//!
//! Multiple triggers (multi-select, change events, retried background
//! jobs) can fire for the same item at once. A lease claims the item
//! for one of them; the others see the claim and skip. A holder that
//! dies without releasing is covered by expiry: leases older than the
//! timeout are reclaimable. This is a best-effort, time-bounded guard,
//! not a strict mutex.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::debug;

pub struct DedupTracker {
    leases: DashMap<String, Instant>,
    lease_timeout: Duration,
}

impl DedupTracker {
    pub fn new(lease_timeout: Duration) -> Self {
        Self {
            leases: DashMap::new(),
            lease_timeout,
        }
    }

    /// Claims the item key. Returns true if the lease was newly created
    /// (or reclaimed from an expired holder), false if an unexpired
    /// lease already exists.
    pub fn try_acquire(&self, item_key: &str) -> bool {
        match self.leases.entry(item_key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().elapsed() >= self.lease_timeout {
                    debug!("Reclaiming expired lease for {}", item_key);
                    occupied.insert(Instant::now());
                    true
                } else {
                    false
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(Instant::now());
                true
            }
        }
    }

    /// Releases a lease. Safe to call for keys that were never acquired
    /// or already expired.
    pub fn release(&self, item_key: &str) {
        self.leases.remove(item_key);
    }

    /// True if an unexpired lease exists for the key.
    pub fn is_held(&self, item_key: &str) -> bool {
        self.leases
            .get(item_key)
            .map(|acquired| acquired.elapsed() < self.lease_timeout)
            .unwrap_or(false)
    }

    /// Drops all expired leases, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.leases.len();
        let timeout = self.lease_timeout;
        self.leases.retain(|_, acquired| acquired.elapsed() < timeout);
        before - self.leases.len()
    }

    pub fn active_count(&self) -> usize {
        self.leases.len()
    }
}

/// Releases the lease when dropped, so cancellation of the holding task
/// cannot leave the item claimed for the full timeout.
pub struct LeaseGuard<'a> {
    tracker: &'a DedupTracker,
    item_key: String,
}

impl<'a> LeaseGuard<'a> {
    /// Tries to claim the key; `None` means someone else holds it.
    pub fn acquire(tracker: &'a DedupTracker, item_key: &str) -> Option<Self> {
        if tracker.try_acquire(item_key) {
            Some(Self {
                tracker,
                item_key: item_key.to_string(),
            })
        } else {
            None
        }
    }
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        self.tracker.release(&self.item_key);
    }
}
