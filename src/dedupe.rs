//! Process-lifetime deduplication of forwarded bookings.
//!
//! The cache answers one question on the hot path: "has this id already been
//! claimed for delivery?". `mark` inserts optimistically *before* delivery is
//! attempted and reports whether the id was newly inserted - that return
//! value is the mutual-exclusion gate that keeps two notifications for the
//! same id from double-sending. `unmark` reopens the id after a terminal
//! delivery failure; successful deliveries stay marked (the record is gone
//! from the source anyway).
//!
//! Membership is an idempotency hint, not a durability guarantee: it is lost
//! on restart, and the sink must tolerate the occasional duplicate.
//!
//! # Eviction
//!
//! The cache is bounded. When it grows past capacity, the oldest-inserted
//! ~20% of entries are dropped in pure insertion order (FIFO, no access
//! promotion). Eviction runs on a periodic timer task rather than inline on
//! insert, keeping `mark` O(1) amortized. Entries mid-delivery are not
//! protected from eviction; a false negative at worst yields one duplicate
//! forward.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::types::BookingId;

/// Default interval between eviction sweeps.
pub const DEFAULT_EVICTION_INTERVAL: Duration = Duration::from_secs(60);

/// Bounded set of booking ids already claimed for delivery.
///
/// All operations take a brief internal lock and are safe to call from
/// concurrent delivery tasks.
#[derive(Debug)]
pub struct DedupCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    seen: HashSet<BookingId>,
    /// Insertion order for FIFO eviction. May hold ids already unmarked;
    /// eviction skips those.
    order: VecDeque<BookingId>,
}

impl DedupCache {
    /// Creates a cache with the given size ceiling.
    pub fn new(capacity: usize) -> Self {
        DedupCache {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Claims an id for delivery.
    ///
    /// Returns `true` if the id was newly inserted. A `false` return means a
    /// delivery for this id is in flight or already succeeded; the caller
    /// must not send.
    pub fn mark(&self, id: &BookingId) -> bool {
        let mut inner = self.lock();
        if !inner.seen.insert(id.clone()) {
            return false;
        }
        inner.order.push_back(id.clone());
        true
    }

    /// Releases an id after a terminal delivery failure, making it eligible
    /// again on the next notification. No-op if the id is not marked.
    pub fn unmark(&self, id: &BookingId) {
        self.lock().seen.remove(id);
    }

    /// True if the id is currently claimed.
    pub fn contains(&self, id: &BookingId) -> bool {
        self.lock().seen.contains(id)
    }

    /// Number of currently claimed ids.
    pub fn len(&self) -> usize {
        self.lock().seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evicts oldest-inserted entries if the cache has grown past capacity.
    ///
    /// Reduces membership to 80% of capacity so the next sweep is not
    /// immediately due again. Returns the number of entries evicted.
    pub fn evict_excess(&self) -> usize {
        let mut inner = self.lock();
        if inner.seen.len() <= self.capacity {
            return 0;
        }

        let target = self.capacity - self.capacity / 5;
        let mut evicted = 0;
        while inner.seen.len() > target {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            // Stale order entries (unmarked ids) don't count.
            if inner.seen.remove(&oldest) {
                evicted += 1;
            }
        }
        evicted
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic inside one of the short critical
        // sections above; the set itself is still structurally sound.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Spawns the periodic eviction sweep.
///
/// Runs until the token is cancelled; contends only for the cache lock and
/// only when a sweep fires.
pub fn spawn_eviction_task(
    cache: Arc<DedupCache>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    let evicted = cache.evict_excess();
                    if evicted > 0 {
                        debug!(evicted, remaining = cache.len(), "Evicted oldest dedup entries");
                    }
                }
            }
        }
    })
}
