//! cache-refresh - Bounded update queue for refreshable lookup caches
//!
//! This library provides the refresh machinery for a lookup cache whose
//! entries expire and must be repopulated from an external source (a
//! database, a remote service). The cache layer submits *update units*,
//! each asking for the values of a set of keys, and a fixed pool of worker
//! threads drains them through a user-supplied update callback.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Cache layer                            │
//! │        Submitter threads: push(unit), wait(unit)            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      UpdateQueue                            │
//! │  - Bounded backlog (admission permits + FIFO delivery)      │
//! │  - Worker pool (configurable size, named threads)           │
//! │  - Per-unit completion signalling with query timeout        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    UpdateCallback                           │
//! │        Performs the refresh against the source              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! - **Update unit**: one refresh request, carrying the requested keys, the
//!   fetched output slots, and its own completion signal. Shared between the
//!   submitter and the worker behind an [`Arc`](std::sync::Arc).
//!
//! - **Admission**: pushing a unit first acquires a permit from a counting
//!   budget bounded at `max_queue_size`, waiting up to the configured push
//!   timeout. The permit is released when a worker dequeues the unit, so the
//!   *backlog length* is what is bounded, not total in-flight work.
//!
//! - **Completion**: each submitter waits on its own unit's condition, up to
//!   the configured query timeout. A failure captured by the worker is
//!   re-materialised as a fresh error value; failure objects are never shared
//!   across threads.
//!
//! - **Shutdown**: [`UpdateQueue::stop_and_wait`] marks the queue finished,
//!   discards pending units, wakes every worker and joins them all. Dropping
//!   the queue performs the same shutdown if it has not happened yet.
//!
//! # Example
//!
//! ```
//! use cache_refresh::{SourceError, UpdateCallback, UpdateQueue, UpdateQueueConfig, UpdateUnit};
//! use std::sync::Arc;
//!
//! struct DoublingSource;
//!
//! impl UpdateCallback<i64, i64> for DoublingSource {
//!     fn update(&self, unit: &UpdateUnit<i64, i64>) -> Result<(), SourceError> {
//!         for &key in unit.requested_keys() {
//!             unit.store(key, key * 2);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let callback: Arc<dyn UpdateCallback<i64, i64>> = Arc::new(DoublingSource);
//! let queue = UpdateQueue::new(
//!     "prices",
//!     UpdateQueueConfig::default().with_worker_count(2),
//!     callback,
//! )
//! .unwrap();
//!
//! let unit = Arc::new(UpdateUnit::new(vec![21]));
//! queue.push(Arc::clone(&unit)).unwrap();
//! queue.wait(&unit).unwrap();
//!
//! assert_eq!(unit.take_fetched().get(&21), Some(&42));
//! ```

mod backlog;
mod callback;
mod config;
mod error;
mod queue;
mod semaphore;
mod stats;
mod unit;

// Configuration
pub use config::{
    UpdateQueueConfig, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_PUSH_TIMEOUT, DEFAULT_QUERY_WAIT_TIMEOUT,
    DEFAULT_WORKER_COUNT,
};

// Errors
pub use error::UpdateQueueError;

// Update units and completion signalling
pub use unit::{UpdateUnit, WaitOutcome};

// Callback contract
pub use callback::{SourceError, UpdateCallback};

// Queue coordinator
pub use queue::UpdateQueue;

// Statistics
pub use stats::UpdateQueueStatsSnapshot;

/// Version of the cache-refresh library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
