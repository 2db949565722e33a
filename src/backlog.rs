//! Bounded FIFO backlog of pending update units.
//!
//! Admission (is there room?) and delivery (is there work?) wait on separate
//! primitives: submitters block on the [`AdmissionBudget`], workers block on
//! the `not_empty` condition. A unit's permit is returned when the unit is
//! *dequeued*, not when its update completes, so the bound applies to the
//! backlog length rather than to total in-flight work.

use crate::semaphore::AdmissionBudget;
use crate::unit::UpdateUnit;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;
use tracing::warn;

pub(crate) struct Backlog<K, V> {
    queue: Mutex<VecDeque<Arc<UpdateUnit<K, V>>>>,
    not_empty: Condvar,
    admission: AdmissionBudget,
}

impl<K, V> Backlog<K, V> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
            admission: AdmissionBudget::new(capacity),
        }
    }

    /// Try to take one admission permit within `timeout`. Does not touch the
    /// queue itself.
    pub(crate) fn try_admit(&self, timeout: Duration) -> bool {
        self.admission.acquire_timeout(timeout)
    }

    /// Return a permit taken by [`try_admit`](Backlog::try_admit) without
    /// enqueuing. Used when the queue finishes between admission and enqueue.
    pub(crate) fn readmit(&self) {
        self.admission.release();
    }

    /// Append a unit and wake one worker. Caller must hold an admission
    /// permit for it.
    pub(crate) fn enqueue(&self, unit: Arc<UpdateUnit<K, V>>) {
        let mut queue = self.lock_queue();
        queue.push_back(unit);
        self.not_empty.notify_one();
    }

    /// Block until a unit is available or `finished` is set.
    ///
    /// Returns `None` once `finished` is observed; pending units at that
    /// point are shutdown discards. On success the dequeued unit's admission
    /// permit is released before returning.
    pub(crate) fn dequeue_blocking(&self, finished: &AtomicBool) -> Option<Arc<UpdateUnit<K, V>>> {
        let mut queue = self.lock_queue();
        loop {
            if finished.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(unit) = queue.pop_front() {
                drop(queue);
                self.admission.release();
                return Some(unit);
            }
            queue = self.not_empty.wait(queue).unwrap_or_else(|poisoned| {
                warn!("backlog condvar poisoned; recovering");
                poisoned.into_inner()
            });
        }
    }

    /// Discard all pending units and wake every waiting worker, so each
    /// observes the finished flag. Returns the number discarded. Discarded
    /// units keep their permits; no admission can succeed once finished.
    pub(crate) fn drain_and_notify_all(&self) -> usize {
        let mut queue = self.lock_queue();
        let discarded = queue.len();
        queue.clear();
        self.not_empty.notify_all();
        discarded
    }

    /// Current backlog length. Advisory: the value may be stale by the time
    /// the caller reads it.
    pub(crate) fn len(&self) -> usize {
        self.lock_queue().len()
    }

    #[cfg(test)]
    pub(crate) fn free_slots(&self) -> usize {
        self.admission.available()
    }

    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<Arc<UpdateUnit<K, V>>>> {
        self.queue.lock().unwrap_or_else(|poisoned| {
            warn!("backlog lock poisoned; recovering");
            poisoned.into_inner()
        })
    }
}
