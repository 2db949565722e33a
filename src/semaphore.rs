//! Counting semaphore for backlog admission.
//!
//! Admission is tracked separately from the backlog queue itself: a submitter
//! first takes a permit here (an O(1) wait on a dedicated condition), and the
//! permit is returned when a worker dequeues the unit. Collapsing admission
//! into the queue's own condition would force submitters to poll the queue
//! length instead.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::warn;

/// Fixed-capacity counting semaphore with a timed acquire.
///
/// Shared by submitters (acquire) and workers (release). A zero-duration
/// acquire is a non-blocking attempt.
pub(crate) struct AdmissionBudget {
    capacity: usize,
    available: Mutex<usize>,
    freed: Condvar,
}

impl AdmissionBudget {
    /// Create a budget with `capacity` permits, all initially available.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            available: Mutex::new(capacity),
            freed: Condvar::new(),
        }
    }

    /// Try to take one permit within `timeout`.
    ///
    /// Returns `true` if a permit was acquired, `false` if the timeout
    /// elapsed first. With a zero timeout this succeeds only if a permit is
    /// immediately free.
    pub(crate) fn acquire_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut available = self.lock_available();
        loop {
            if *available > 0 {
                *available -= 1;
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _timed_out) = self
                .freed
                .wait_timeout(available, deadline - now)
                .unwrap_or_else(|poisoned| {
                    warn!("admission budget condvar poisoned; recovering");
                    poisoned.into_inner()
                });
            available = guard;
        }
    }

    /// Return one permit and wake one waiter.
    pub(crate) fn release(&self) {
        let mut available = self.lock_available();
        debug_assert!(*available < self.capacity, "admission permit over-release");
        if *available < self.capacity {
            *available += 1;
        }
        self.freed.notify_one();
    }

    /// Number of permits currently free.
    pub(crate) fn available(&self) -> usize {
        *self.lock_available()
    }

    fn lock_available(&self) -> MutexGuard<'_, usize> {
        self.available.lock().unwrap_or_else(|poisoned| {
            warn!("admission budget lock poisoned; recovering");
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_starts_with_full_capacity() {
        let budget = AdmissionBudget::new(3);
        assert_eq!(budget.available(), 3);
    }

    #[test]
    fn test_acquire_decrements_and_release_restores() {
        let budget = AdmissionBudget::new(2);

        assert!(budget.acquire_timeout(Duration::ZERO));
        assert!(budget.acquire_timeout(Duration::ZERO));
        assert_eq!(budget.available(), 0);

        budget.release();
        assert_eq!(budget.available(), 1);
    }

    #[test]
    fn test_zero_timeout_fails_when_exhausted() {
        let budget = AdmissionBudget::new(1);
        assert!(budget.acquire_timeout(Duration::ZERO));

        let start = Instant::now();
        assert!(!budget.acquire_timeout(Duration::ZERO));
        // Non-blocking attempt must not wait.
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_acquire_times_out_when_exhausted() {
        let budget = AdmissionBudget::new(1);
        assert!(budget.acquire_timeout(Duration::ZERO));

        let start = Instant::now();
        assert!(!budget.acquire_timeout(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_blocked_acquire_resumes_on_release() {
        let budget = Arc::new(AdmissionBudget::new(1));
        assert!(budget.acquire_timeout(Duration::ZERO));

        let (done_tx, done_rx) = mpsc::channel();
        let budget_for_thread = Arc::clone(&budget);
        thread::spawn(move || {
            let acquired = budget_for_thread.acquire_timeout(Duration::from_secs(5));
            let _ = done_tx.send(acquired);
        });

        // The waiter should still be blocked.
        assert!(done_rx
            .recv_timeout(Duration::from_millis(50))
            .is_err());

        budget.release();
        assert!(done_rx.recv_timeout(Duration::from_secs(1)).unwrap());
        assert_eq!(budget.available(), 0);
    }

    #[test]
    fn test_release_wakes_one_waiter_at_a_time() {
        let budget = Arc::new(AdmissionBudget::new(2));
        assert!(budget.acquire_timeout(Duration::ZERO));
        assert!(budget.acquire_timeout(Duration::ZERO));

        let (done_tx, done_rx) = mpsc::channel();
        for _ in 0..2 {
            let budget_for_thread = Arc::clone(&budget);
            let done_tx = done_tx.clone();
            thread::spawn(move || {
                let acquired = budget_for_thread.acquire_timeout(Duration::from_secs(5));
                let _ = done_tx.send(acquired);
            });
        }

        budget.release();
        assert!(done_rx.recv_timeout(Duration::from_secs(1)).unwrap());
        assert!(done_rx
            .recv_timeout(Duration::from_millis(50))
            .is_err());

        budget.release();
        assert!(done_rx.recv_timeout(Duration::from_secs(1)).unwrap());
    }
}
