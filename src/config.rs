//! Update queue configuration.

use crate::error::UpdateQueueError;
use std::time::Duration;

/// Default maximum number of pending update units.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 100_000;

/// Default number of worker threads draining the queue.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default time a submitter waits for admission before giving up.
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_millis(10);

/// Default time a submitter waits for a unit to complete.
pub const DEFAULT_QUERY_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for an [`UpdateQueue`](crate::UpdateQueue).
///
/// # Example
///
/// ```
/// use cache_refresh::UpdateQueueConfig;
/// use std::time::Duration;
///
/// let config = UpdateQueueConfig::default()
///     .with_max_queue_size(1024)
///     .with_worker_count(8)
///     .with_push_timeout(Duration::from_millis(50));
/// ```
#[derive(Debug, Clone)]
pub struct UpdateQueueConfig {
    /// Maximum number of pending units in the backlog.
    pub max_queue_size: usize,
    /// Number of worker threads started at construction.
    pub worker_count: usize,
    /// How long a push waits for a free backlog slot. Zero means a
    /// non-blocking attempt that succeeds only if a slot is immediately free.
    pub push_timeout: Duration,
    /// How long a wait blocks for a unit to complete. Must be non-zero.
    pub query_wait_timeout: Duration,
}

impl Default for UpdateQueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            worker_count: DEFAULT_WORKER_COUNT,
            push_timeout: DEFAULT_PUSH_TIMEOUT,
            query_wait_timeout: DEFAULT_QUERY_WAIT_TIMEOUT,
        }
    }
}

impl UpdateQueueConfig {
    /// Set the maximum number of pending units.
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Set the number of worker threads.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the admission timeout for pushes.
    pub fn with_push_timeout(mut self, push_timeout: Duration) -> Self {
        self.push_timeout = push_timeout;
        self
    }

    /// Set the completion timeout for waits.
    pub fn with_query_wait_timeout(mut self, query_wait_timeout: Duration) -> Self {
        self.query_wait_timeout = query_wait_timeout;
        self
    }

    /// Validate the configuration at queue construction time.
    pub(crate) fn validate(&self) -> Result<(), UpdateQueueError> {
        if self.max_queue_size == 0 {
            return Err(UpdateQueueError::InvalidConfig(
                "max_queue_size must be greater than zero".to_string(),
            ));
        }
        if self.worker_count == 0 {
            return Err(UpdateQueueError::InvalidConfig(
                "worker_count must be greater than zero".to_string(),
            ));
        }
        if self.query_wait_timeout.is_zero() {
            return Err(UpdateQueueError::InvalidConfig(
                "query_wait_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
