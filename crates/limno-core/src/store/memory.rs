use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

use super::index::ReadingIndex;
use super::{PageRequest, ReadingFilter, ReadingStore, StorageError, StorageResult};
use crate::reading::{Reading, ReadingId, StoredReading};

/// Volatile store backed by a vector behind a `RwLock`.
///
/// Used by tests and by hosts that do not need persistence.
#[derive(Debug)]
pub struct MemoryStore {
    index: RwLock<ReadingIndex>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            index: RwLock::new(ReadingIndex::new()),
        }
    }

    /// Total number of stored readings across all sensors
    pub fn len(&self) -> StorageResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, ReadingIndex>> {
        self.index.read().map_err(|_| StorageError::Poisoned)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, ReadingIndex>> {
        self.index.write().map_err(|_| StorageError::Poisoned)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadingStore for MemoryStore {
    fn insert_readings(&self, batch: &[Reading]) -> StorageResult<Vec<StoredReading>> {
        let mut index = self.write()?;
        let staged = index.stage(batch);
        index.commit(&staged);

        debug!("Stored {} readings in memory", staged.len());
        Ok(staged)
    }

    fn query_readings(
        &self,
        filter: &ReadingFilter,
        page: PageRequest,
    ) -> StorageResult<Vec<StoredReading>> {
        Ok(self.read()?.query(filter, page))
    }

    fn count_readings(&self, filter: &ReadingFilter) -> StorageResult<usize> {
        Ok(self.read()?.count(filter))
    }

    fn delete_reading(&self, id: ReadingId) -> StorageResult<bool> {
        Ok(self.write()?.remove(id).is_some())
    }

    fn scan_readings(
        &self,
        filter: &ReadingFilter,
        visit: &mut dyn FnMut(&StoredReading),
    ) -> StorageResult<()> {
        let index = self.read()?;
        for row in index.matching(filter) {
            visit(row);
        }
        Ok(())
    }
}
