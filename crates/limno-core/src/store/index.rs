use core::cmp::Reverse;

use super::{PageRequest, ReadingFilter};
use crate::reading::{Reading, ReadingId, StoredReading};

/// In-memory reading table shared by the store implementations.
///
/// Rows are kept in insertion order; queries sort on demand.
#[derive(Debug)]
pub(super) struct ReadingIndex {
    rows: Vec<StoredReading>,
    next_id: u64,
}

impl ReadingIndex {
    pub(super) fn new() -> Self {
        Self {
            rows: Vec::new(),
            next_id: 1,
        }
    }

    /// Rebuild from persisted rows. The next id continues after the highest
    /// one seen, and never goes below `next_id_floor`.
    pub(super) fn from_rows(rows: Vec<StoredReading>, next_id_floor: u64) -> Self {
        let next_id = rows
            .iter()
            .map(|row| row.id.0 + 1)
            .max()
            .unwrap_or(1)
            .max(next_id_floor);
        Self { rows, next_id }
    }

    /// Id the next staged reading will receive
    pub(super) fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Assign ids to a batch without storing it yet.
    pub(super) fn stage(&self, batch: &[Reading]) -> Vec<StoredReading> {
        batch
            .iter()
            .zip(self.next_id..)
            .map(|(reading, id)| StoredReading::new(ReadingId(id), reading.clone()))
            .collect()
    }

    /// Store rows previously produced by [`stage`](Self::stage).
    pub(super) fn commit(&mut self, staged: &[StoredReading]) {
        if let Some(last) = staged.last() {
            self.next_id = last.id.0 + 1;
        }
        self.rows.extend_from_slice(staged);
    }

    pub(super) fn query(&self, filter: &ReadingFilter, page: PageRequest) -> Vec<StoredReading> {
        if filter.collected_at.is_empty() {
            return Vec::new();
        }

        let mut matching: Vec<&StoredReading> = self.matching(filter).collect();
        matching.sort_unstable_by_key(|row| Reverse((row.reading.collected_at, row.id)));

        matching
            .into_iter()
            .skip(page.offset)
            .take(page.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub(super) fn count(&self, filter: &ReadingFilter) -> usize {
        self.matching(filter).count()
    }

    pub(super) fn matching<'a>(
        &'a self,
        filter: &'a ReadingFilter,
    ) -> impl Iterator<Item = &'a StoredReading> + 'a {
        self.rows.iter().filter(|row| filter.matches(&row.reading))
    }

    pub(super) fn remove(&mut self, id: ReadingId) -> Option<StoredReading> {
        let position = self.rows.iter().position(|row| row.id == id)?;
        Some(self.rows.remove(position))
    }

    pub(super) fn rows(&self) -> &[StoredReading] {
        &self.rows
    }

    pub(super) fn len(&self) -> usize {
        self.rows.len()
    }
}
