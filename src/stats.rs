//! Update queue statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters maintained by the queue. Diagnostics only, never a
/// synchronisation primitive.
#[derive(Debug, Default)]
pub(crate) struct UpdateQueueStats {
    pushed: AtomicU64,
    push_timeouts: AtomicU64,
    completed_updates: AtomicU64,
    failed_updates: AtomicU64,
    wait_timeouts: AtomicU64,
    discarded_at_shutdown: AtomicU64,
}

impl UpdateQueueStats {
    pub(crate) fn record_pushed(&self) {
        self.pushed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_push_timeout(&self) {
        self.push_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self) {
        self.completed_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_wait_timeout(&self) {
        self.wait_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self, count: u64) {
        self.discarded_at_shutdown.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> UpdateQueueStatsSnapshot {
        UpdateQueueStatsSnapshot {
            pushed: self.pushed.load(Ordering::Relaxed),
            push_timeouts: self.push_timeouts.load(Ordering::Relaxed),
            completed_updates: self.completed_updates.load(Ordering::Relaxed),
            failed_updates: self.failed_updates.load(Ordering::Relaxed),
            wait_timeouts: self.wait_timeouts.load(Ordering::Relaxed),
            discarded_at_shutdown: self.discarded_at_shutdown.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the queue's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateQueueStatsSnapshot {
    /// Units successfully admitted and enqueued.
    pub pushed: u64,
    /// Pushes rejected because no slot freed within the push timeout.
    pub push_timeouts: u64,
    /// Units whose callback returned successfully.
    pub completed_updates: u64,
    /// Units whose callback failed or panicked.
    pub failed_updates: u64,
    /// Waits that gave up before their unit completed.
    pub wait_timeouts: u64,
    /// Pending units discarded by shutdown.
    pub discarded_at_shutdown: u64,
}
