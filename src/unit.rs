//! Update units: one refresh request and its completion signal.
//!
//! A unit is created by the submitter, shared with the queue behind an
//! [`Arc`](std::sync::Arc), claimed by exactly one worker, and read back by
//! the submitter once completion is observed. Each unit carries its own
//! condition variable, so completing one unit wakes only the submitter that
//! is waiting for it.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::warn;

/// Completion state of a unit. `Done` and `Failed` are terminal; the failure
/// is a value-copied description, never a shared error object.
#[derive(Debug, Clone)]
enum Completion {
    Pending,
    Done,
    Failed(String),
}

/// Result of waiting for a unit to complete.
///
/// Conversion into an error is the caller's decision; see
/// [`UpdateQueue::wait`](crate::UpdateQueue::wait).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The callback returned successfully; the fetched values are visible.
    Done,
    /// The callback failed; carries the captured failure description.
    Failed(String),
    /// The unit did not complete before the deadline.
    TimedOut,
}

/// One refresh request: fetch the values for a set of keys.
///
/// The requested keys are immutable after construction. The fetched map is
/// written only by the worker that claims the unit and read by the submitter
/// after [`wait`](UpdateUnit::wait) observes completion; the completion
/// signal establishes the necessary happens-before edge.
pub struct UpdateUnit<K, V> {
    requested_keys: Vec<K>,
    fetched: Mutex<HashMap<K, V>>,
    state: Mutex<Completion>,
    completed: Condvar,
}

impl<K, V> UpdateUnit<K, V> {
    /// Create a pending unit requesting the given keys.
    pub fn new(requested_keys: Vec<K>) -> Self {
        Self {
            requested_keys,
            fetched: Mutex::new(HashMap::new()),
            state: Mutex::new(Completion::Pending),
            completed: Condvar::new(),
        }
    }

    /// The keys this unit asks the source for.
    pub fn requested_keys(&self) -> &[K] {
        &self.requested_keys
    }

    /// Whether the unit completed successfully.
    pub fn is_done(&self) -> bool {
        matches!(*self.lock_state(), Completion::Done)
    }

    /// The captured failure description, if the callback failed.
    pub fn failure(&self) -> Option<String> {
        match &*self.lock_state() {
            Completion::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }

    /// Take the fetched values, leaving the unit's output empty.
    ///
    /// Meant for the submitter after a successful wait; the returned map is
    /// owned, so the unit can be dropped immediately afterwards.
    pub fn take_fetched(&self) -> HashMap<K, V> {
        std::mem::take(&mut *self.lock_fetched())
    }

    /// Block until the unit leaves the pending state or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock_state();
        loop {
            match &*state {
                Completion::Done => return WaitOutcome::Done,
                Completion::Failed(message) => return WaitOutcome::Failed(message.clone()),
                Completion::Pending => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::TimedOut;
            }
            let (guard, _timed_out) = self
                .completed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|poisoned| {
                    warn!("update unit condvar poisoned; recovering");
                    poisoned.into_inner()
                });
            state = guard;
        }
    }

    /// Worker-only: record successful completion and wake the submitter.
    pub(crate) fn mark_done(&self) {
        {
            let mut state = self.lock_state();
            debug_assert!(
                matches!(*state, Completion::Pending),
                "update unit completed twice"
            );
            if matches!(*state, Completion::Pending) {
                *state = Completion::Done;
            }
        }
        self.completed.notify_all();
    }

    /// Worker-only: record a captured failure and wake the submitter.
    pub(crate) fn mark_failed(&self, message: String) {
        {
            let mut state = self.lock_state();
            debug_assert!(
                matches!(*state, Completion::Pending),
                "update unit completed twice"
            );
            if matches!(*state, Completion::Pending) {
                *state = Completion::Failed(message);
            }
        }
        self.completed.notify_all();
    }

    fn lock_state(&self) -> MutexGuard<'_, Completion> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("update unit state lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    fn lock_fetched(&self) -> MutexGuard<'_, HashMap<K, V>> {
        self.fetched.lock().unwrap_or_else(|poisoned| {
            warn!("update unit output lock poisoned; recovering");
            poisoned.into_inner()
        })
    }
}

impl<K: Eq + Hash, V> UpdateUnit<K, V> {
    /// Worker-only: store one fetched value in the unit's output slots.
    pub fn store(&self, key: K, value: V) {
        self.lock_fetched().insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_unit_is_pending() {
        let unit: UpdateUnit<i64, i64> = UpdateUnit::new(vec![1, 2, 3]);

        assert!(!unit.is_done());
        assert!(unit.failure().is_none());
        assert_eq!(unit.requested_keys(), &[1, 2, 3]);
    }

    #[test]
    fn test_wait_returns_done_after_mark_done() {
        let unit: UpdateUnit<i64, i64> = UpdateUnit::new(vec![1]);
        unit.mark_done();

        assert_eq!(unit.wait(Duration::from_millis(10)), WaitOutcome::Done);
        assert!(unit.is_done());
    }

    #[test]
    fn test_wait_returns_captured_failure() {
        let unit: UpdateUnit<i64, i64> = UpdateUnit::new(vec![1]);
        unit.mark_failed("boom".to_string());

        assert_eq!(
            unit.wait(Duration::from_millis(10)),
            WaitOutcome::Failed("boom".to_string())
        );
        assert_eq!(unit.failure(), Some("boom".to_string()));
        assert!(!unit.is_done());
    }

    #[test]
    fn test_wait_times_out_on_pending_unit() {
        let unit: UpdateUnit<i64, i64> = UpdateUnit::new(vec![1]);

        let start = Instant::now();
        assert_eq!(unit.wait(Duration::from_millis(50)), WaitOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_wait_wakes_when_marked_from_another_thread() {
        let unit: Arc<UpdateUnit<i64, i64>> = Arc::new(UpdateUnit::new(vec![7]));

        let (started_tx, started_rx) = mpsc::channel();
        let unit_for_thread = Arc::clone(&unit);
        let waiter = thread::spawn(move || {
            let _ = started_tx.send(());
            unit_for_thread.wait(Duration::from_secs(5))
        });

        started_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        unit.store(7, 14);
        unit.mark_done();

        assert_eq!(waiter.join().unwrap(), WaitOutcome::Done);
        assert_eq!(unit.take_fetched().get(&7), Some(&14));
    }

    #[test]
    fn test_store_and_take_fetched() {
        let unit = UpdateUnit::new(vec!["a", "b"]);
        unit.store("a", 1);
        unit.store("b", 2);

        let fetched = unit.take_fetched();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched.get("a"), Some(&1));
        assert_eq!(fetched.get("b"), Some(&2));

        // A second take sees the emptied output.
        assert!(unit.take_fetched().is_empty());
    }

    #[test]
    fn test_completion_is_terminal() {
        let unit: UpdateUnit<i64, i64> = UpdateUnit::new(vec![1]);
        unit.mark_done();

        assert!(unit.is_done());
        assert!(unit.failure().is_none());
    }
}
