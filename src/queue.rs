//! The update queue coordinator.
//!
//! Owns the backlog and the worker pool, and enforces the lifecycle
//! invariants: once finished, nothing is ever enqueued again, and
//! [`stop_and_wait`](UpdateQueue::stop_and_wait) returns only after every
//! worker thread has terminated.
//!
//! Lock discipline: at most one of the backlog mutex and a unit's state
//! mutex is held at any time. Workers drop the backlog lock before invoking
//! the callback or touching the unit; submitters never hold the backlog lock.

use crate::backlog::Backlog;
use crate::callback::UpdateCallback;
use crate::config::UpdateQueueConfig;
use crate::error::UpdateQueueError;
use crate::stats::{UpdateQueueStats, UpdateQueueStatsSnapshot};
use crate::unit::{UpdateUnit, WaitOutcome};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Bounded multi-worker queue that serialises refresh work for one logical
/// dictionary.
///
/// Submitters construct an [`UpdateUnit`], [`push`](UpdateQueue::push) it,
/// then [`wait`](UpdateQueue::wait) for that unit. A fixed pool of worker
/// threads, started at construction, drains the backlog through the supplied
/// [`UpdateCallback`].
pub struct UpdateQueue<K, V> {
    dictionary_name: String,
    config: UpdateQueueConfig,
    backlog: Arc<Backlog<K, V>>,
    finished: Arc<AtomicBool>,
    stats: Arc<UpdateQueueStats>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<K, V> UpdateQueue<K, V> {
    /// Create the queue and start `worker_count` worker threads.
    ///
    /// `dictionary_name` labels every error and log line this queue emits.
    /// If any worker thread cannot be spawned, construction rolls back:
    /// already started workers are stopped and joined, and the spawn error
    /// is returned.
    ///
    /// # Errors
    ///
    /// [`UpdateQueueError::InvalidConfig`] if the configuration fails
    /// validation, [`UpdateQueueError::WorkerSpawn`] if thread creation
    /// fails.
    pub fn new(
        dictionary_name: impl Into<String>,
        config: UpdateQueueConfig,
        callback: Arc<dyn UpdateCallback<K, V>>,
    ) -> Result<Self, UpdateQueueError>
    where
        K: Send + Sync + 'static,
        V: Send + 'static,
    {
        config.validate()?;

        let dictionary_name = dictionary_name.into();
        let backlog = Arc::new(Backlog::new(config.max_queue_size));
        let finished = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(UpdateQueueStats::default());

        let mut handles = Vec::with_capacity(config.worker_count);
        for index in 0..config.worker_count {
            let backlog = Arc::clone(&backlog);
            let callback = Arc::clone(&callback);
            let finished = Arc::clone(&finished);
            let stats = Arc::clone(&stats);
            let dictionary = dictionary_name.clone();

            let backlog_for_rollback = Arc::clone(&backlog);
            let finished_for_rollback = Arc::clone(&finished);

            let spawned = thread::Builder::new()
                .name(format!("upd-queue-{index}"))
                .spawn(move || {
                    worker_loop(&dictionary, &backlog, callback.as_ref(), &finished, &stats);
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    // Roll back: stop the workers that did start, then fail
                    // construction atomically.
                    finished_for_rollback.store(true, Ordering::SeqCst);
                    backlog_for_rollback.drain_and_notify_all();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(UpdateQueueError::WorkerSpawn(source));
                }
            }
        }

        info!(
            "started update queue for dictionary '{}': {} worker(s), capacity {}",
            dictionary_name, config.worker_count, config.max_queue_size
        );

        Ok(Self {
            dictionary_name,
            config,
            backlog,
            finished,
            stats,
            workers: Mutex::new(handles),
        })
    }

    /// Enqueue a unit for refresh.
    ///
    /// Blocks on admission for up to the configured push timeout.
    ///
    /// # Errors
    ///
    /// [`UpdateQueueError::Finished`] if the queue has been stopped,
    /// [`UpdateQueueError::PushTimedOut`] if no backlog slot freed in time.
    pub fn push(&self, unit: Arc<UpdateUnit<K, V>>) -> Result<(), UpdateQueueError> {
        if self.finished.load(Ordering::SeqCst) {
            return Err(self.finished_error());
        }

        if !self.backlog.try_admit(self.config.push_timeout) {
            self.stats.record_push_timeout();
            return Err(UpdateQueueError::PushTimedOut {
                dictionary: self.dictionary_name.clone(),
                timeout_ms: self.config.push_timeout.as_millis() as u64,
                queue_size: self.backlog.len(),
            });
        }

        // The queue may have stopped while we waited for admission; the
        // permit must go back so the backlog accounting stays intact.
        if self.finished.load(Ordering::SeqCst) {
            self.backlog.readmit();
            return Err(self.finished_error());
        }

        self.backlog.enqueue(unit);
        self.stats.record_pushed();
        Ok(())
    }

    /// Block until `unit` completes, up to the configured query wait timeout.
    ///
    /// # Errors
    ///
    /// [`UpdateQueueError::Finished`] if the queue has been stopped,
    /// [`UpdateQueueError::WaitTimedOut`] if the unit did not complete in
    /// time, [`UpdateQueueError::UpdateFailed`] carrying the captured
    /// description if the callback failed.
    pub fn wait(&self, unit: &UpdateUnit<K, V>) -> Result<(), UpdateQueueError> {
        if self.finished.load(Ordering::SeqCst) {
            return Err(self.finished_error());
        }

        match unit.wait(self.config.query_wait_timeout) {
            WaitOutcome::Done => Ok(()),
            WaitOutcome::Failed(message) => Err(UpdateQueueError::UpdateFailed {
                dictionary: self.dictionary_name.clone(),
                message,
            }),
            WaitOutcome::TimedOut => {
                self.stats.record_wait_timeout();
                Err(UpdateQueueError::WaitTimedOut {
                    dictionary: self.dictionary_name.clone(),
                    timeout_ms: self.config.query_wait_timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Stop the queue: discard pending units, wake all waiters, join every
    /// worker thread.
    ///
    /// In-flight callbacks run to completion; their submitters either
    /// observe the result or time out. Submitters of discarded units see a
    /// wait timeout, which is correct: no worker will ever claim them.
    ///
    /// # Errors
    ///
    /// [`UpdateQueueError::AlreadyStopped`] if the queue was stopped before.
    pub fn stop_and_wait(&self) -> Result<(), UpdateQueueError> {
        if self.finished.swap(true, Ordering::SeqCst) {
            return Err(UpdateQueueError::AlreadyStopped {
                dictionary: self.dictionary_name.clone(),
            });
        }

        let discarded = self.backlog.drain_and_notify_all();
        if discarded > 0 {
            warn!(
                "discarding {} pending update(s) for dictionary '{}' at shutdown",
                discarded, self.dictionary_name
            );
            self.stats.record_discarded(discarded as u64);
        }

        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().unwrap_or_else(|poisoned| {
                warn!("worker handle lock poisoned; recovering");
                poisoned.into_inner()
            });
            workers.drain(..).collect()
        };
        for handle in handles {
            if handle.join().is_err() {
                error!(
                    "update worker for dictionary '{}' terminated abnormally",
                    self.dictionary_name
                );
            }
        }

        info!(
            "stopped update queue for dictionary '{}'",
            self.dictionary_name
        );
        Ok(())
    }

    /// Current backlog length.
    ///
    /// Advisory only: the value is not synchronised against concurrent
    /// pushes, dequeues or stop, and may be stale by the time the caller
    /// reads it. Meant for diagnostics and error messages.
    pub fn len(&self) -> usize {
        self.backlog.len()
    }

    /// Whether the backlog is currently empty. Advisory, like
    /// [`len`](UpdateQueue::len).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The logical dictionary this queue refreshes.
    pub fn dictionary_name(&self) -> &str {
        &self.dictionary_name
    }

    /// Snapshot of the queue's counters.
    pub fn stats(&self) -> UpdateQueueStatsSnapshot {
        self.stats.snapshot()
    }

    fn finished_error(&self) -> UpdateQueueError {
        UpdateQueueError::Finished {
            dictionary: self.dictionary_name.clone(),
        }
    }
}

impl<K, V> Drop for UpdateQueue<K, V> {
    fn drop(&mut self) {
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.stop_and_wait() {
            error!(
                "error while stopping update queue for dictionary '{}': {}",
                self.dictionary_name, err
            );
        }
    }
}

/// Drain loop run by each worker thread.
///
/// Exactly one of `mark_done` / `mark_failed` is recorded per dequeued unit.
/// The callback runs with no queue or unit lock held, and a panicking
/// callback is contained and captured like any other failure, so a bad
/// callback cannot terminate the worker.
fn worker_loop<K, V>(
    dictionary: &str,
    backlog: &Backlog<K, V>,
    callback: &dyn UpdateCallback<K, V>,
    finished: &AtomicBool,
    stats: &UpdateQueueStats,
) {
    while !finished.load(Ordering::SeqCst) {
        let unit = match backlog.dequeue_blocking(finished) {
            Some(unit) => unit,
            None => break,
        };

        match panic::catch_unwind(AssertUnwindSafe(|| callback.update(&unit))) {
            Ok(Ok(())) => {
                unit.mark_done();
                stats.record_completed();
            }
            Ok(Err(source)) => {
                debug!(
                    "update callback failed for dictionary '{}': {}",
                    dictionary, source
                );
                unit.mark_failed(source.to_string());
                stats.record_failed();
            }
            Err(payload) => {
                let message = panic_description(payload.as_ref());
                debug!(
                    "update callback panicked for dictionary '{}': {}",
                    dictionary, message
                );
                unit.mark_failed(message);
                stats.record_failed();
            }
        }
    }
}

fn panic_description(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "update callback panicked".to_string()
    }
}
