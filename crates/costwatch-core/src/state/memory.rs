use costwatch_types::{AlertState, PeriodKey};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{DedupStateStore, VersionedState, WriteOutcome};
use crate::error::StoreError;

/// In-process store. Each key's compare-and-set runs under the shard lock.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: DashMap<PeriodKey, VersionedState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DedupStateStore for MemoryStateStore {
    fn read(&self, period: &PeriodKey) -> Result<Option<VersionedState>, StoreError> {
        Ok(self.entries.get(period).map(|entry| entry.value().clone()))
    }

    fn write(
        &self,
        period: &PeriodKey,
        state: &AlertState,
        expected_version: Option<u64>,
    ) -> Result<WriteOutcome, StoreError> {
        match (self.entries.entry(period.clone()), expected_version) {
            (Entry::Vacant(slot), None) => {
                slot.insert(VersionedState {
                    state: state.clone(),
                    version: 1,
                });
                Ok(WriteOutcome::Written { version: 1 })
            }
            (Entry::Occupied(mut slot), Some(expected)) if slot.get().version == expected => {
                let version = expected + 1;
                slot.insert(VersionedState {
                    state: state.clone(),
                    version,
                });
                Ok(WriteOutcome::Written { version })
            }
            _ => Ok(WriteOutcome::Conflict),
        }
    }
}
