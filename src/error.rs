//! Error types for the update queue.

use thiserror::Error;

/// Errors reported by [`UpdateQueue`](crate::UpdateQueue) operations.
///
/// Every variant names the logical dictionary the queue refreshes, so a
/// process hosting several caches can attribute failures from the message
/// alone.
#[derive(Debug, Error)]
pub enum UpdateQueueError {
    /// Push or wait was called after the queue was stopped. Callers should
    /// treat this as a cache miss.
    #[error("update queue for dictionary '{dictionary}' is already finished")]
    Finished {
        /// Logical dictionary name.
        dictionary: String,
    },

    /// No backlog slot became free within the push timeout. Callers should
    /// treat this as transient overload.
    #[error(
        "cannot push to update queue for dictionary '{dictionary}': \
         time limit of {timeout_ms} ms exceeded, current queue size is {queue_size}"
    )]
    PushTimedOut {
        /// Logical dictionary name.
        dictionary: String,
        /// The configured push timeout, in milliseconds.
        timeout_ms: u64,
        /// Backlog length observed when the timeout fired (advisory).
        queue_size: usize,
    },

    /// The unit did not complete within the query wait timeout. Callers
    /// should treat this as source unavailability.
    #[error(
        "dictionary '{dictionary}' source seems unavailable: \
         {timeout_ms} ms timeout exceeded"
    )]
    WaitTimedOut {
        /// Logical dictionary name.
        dictionary: String,
        /// The configured query wait timeout, in milliseconds.
        timeout_ms: u64,
    },

    /// The update callback failed for this unit. The message is a value
    /// copy of the worker-captured failure description.
    #[error("update failed for dictionary '{dictionary}': {message}")]
    UpdateFailed {
        /// Logical dictionary name.
        dictionary: String,
        /// Description captured by the worker.
        message: String,
    },

    /// `stop_and_wait` was called on a queue that was already stopped.
    #[error("update queue for dictionary '{dictionary}' is already stopped")]
    AlreadyStopped {
        /// Logical dictionary name.
        dictionary: String,
    },

    /// The configuration failed validation at construction time.
    #[error("invalid update queue configuration: {0}")]
    InvalidConfig(String),

    /// A worker thread could not be spawned at construction time.
    #[error("failed to spawn update worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}
