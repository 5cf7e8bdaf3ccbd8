//! Durable alert firing history, keyed by period
//!
//! The store is the only shared mutable resource between runs. Writes are
//! versioned compare-and-set so two overlapping runs cannot both record the
//! same level as newly fired without one of them seeing a conflict.

use costwatch_types::{AlertState, PeriodKey};

use crate::error::StoreError;

mod memory;
mod sqlite;

pub use memory::MemoryStateStore;
pub use sqlite::SqliteStateStore;

/// State as read from the store, with the version to pass back on write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedState {
    pub state: AlertState,
    pub version: u64,
}

/// Outcome of a compare-and-set write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { version: u64 },
    /// Another writer got there first; re-read and re-evaluate
    Conflict,
}

/// Per-period alert state storage
pub trait DedupStateStore: Send + Sync {
    /// `Ok(None)` for a period never written, which is a valid first run
    fn read(&self, period: &PeriodKey) -> Result<Option<VersionedState>, StoreError>;

    /// Write `state` if the stored version still equals `expected_version`.
    ///
    /// `None` means "only if absent".
    fn write(
        &self,
        period: &PeriodKey,
        state: &AlertState,
        expected_version: Option<u64>,
    ) -> Result<WriteOutcome, StoreError>;
}

impl<S: DedupStateStore + ?Sized> DedupStateStore for std::sync::Arc<S> {
    fn read(&self, period: &PeriodKey) -> Result<Option<VersionedState>, StoreError> {
        (**self).read(period)
    }

    fn write(
        &self,
        period: &PeriodKey,
        state: &AlertState,
        expected_version: Option<u64>,
    ) -> Result<WriteOutcome, StoreError> {
        (**self).write(period, state, expected_version)
    }
}
