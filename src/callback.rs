//! The update callback contract.

use crate::unit::UpdateUnit;

/// Failure raised by the external source during a refresh.
///
/// Boxed so callbacks can surface whatever error type their source produces;
/// the queue only ever keeps a value copy of its description.
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Performs the refresh for a single update unit.
///
/// Supplied once at queue construction and invoked by worker threads. The
/// callback must read only the unit's requested keys, write only its output
/// slots (via [`UpdateUnit::store`]), and must not retain the unit reference
/// past return. It must not push further units onto the same queue: with the
/// backlog at capacity that push would wait on admission forever, parked
/// behind the very unit the worker is processing.
///
/// Returning `Err` is the sole mechanism to report refresh failure; the
/// worker records the description and delivers it to the unit's submitter.
pub trait UpdateCallback<K, V>: Send + Sync {
    /// Refresh the values for `unit.requested_keys()`.
    fn update(&self, unit: &UpdateUnit<K, V>) -> Result<(), SourceError>;
}

impl<K, V, F> UpdateCallback<K, V> for F
where
    F: Fn(&UpdateUnit<K, V>) -> Result<(), SourceError> + Send + Sync,
{
    fn update(&self, unit: &UpdateUnit<K, V>) -> Result<(), SourceError> {
        self(unit)
    }
}
