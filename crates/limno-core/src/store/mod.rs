//! Reading storage collaborators
//!
//! The core only needs four things from storage: insert a batch, page through
//! readings newest-first, count readings, and walk every reading matching a
//! filter. [`ReadingStore`] captures that contract; [`MemoryStore`] and
//! [`FileStore`] implement it.

mod file;
mod index;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::reading::{ParameterId, Reading, ReadingId, SensorId, StoredReading};

/// Page size used by the default [`ReadingStore::scan_readings`].
pub const SCAN_PAGE_SIZE: usize = 1024;

/// Errors returned by storage collaborators
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode reading: {0}")]
    Encode(#[from] postcard::Error),

    /// A persisted record could not be decoded
    #[error("corrupt record at byte {offset}: {reason}")]
    Corrupt { offset: usize, reason: String },

    /// A writer panicked while holding the store lock
    #[error("store lock poisoned")]
    Poisoned,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Closed time interval; a missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// `start <= instant <= end`
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| start <= instant) && self.end.is_none_or(|end| instant <= end)
    }

    /// Whether no instant can satisfy the range
    pub fn is_empty(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if start > end)
    }
}

/// Which readings a query touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingFilter {
    pub sensor: SensorId,
    pub parameter: Option<ParameterId>,
    pub collected_at: TimeRange,
}

impl ReadingFilter {
    pub fn new(sensor: SensorId) -> Self {
        Self {
            sensor,
            parameter: None,
            collected_at: TimeRange::default(),
        }
    }

    pub fn with_parameter(mut self, parameter: ParameterId) -> Self {
        self.parameter = Some(parameter);
        self
    }

    pub fn with_range(mut self, range: TimeRange) -> Self {
        self.collected_at = range;
        self
    }

    pub fn matches(&self, reading: &Reading) -> bool {
        reading.sensor == self.sensor
            && self
                .parameter
                .as_ref()
                .is_none_or(|parameter| &reading.parameter == parameter)
            && self.collected_at.contains(reading.collected_at)
    }
}

/// Skip/limit window over a newest-first result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageRequest {
    pub offset: usize,
    /// `None` returns everything after `offset`
    pub limit: Option<usize>,
}

impl PageRequest {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    /// 1-based page number of `per_page` items.
    pub fn page(page: usize, per_page: usize) -> Self {
        Self::new(page.saturating_sub(1).saturating_mul(per_page), per_page)
    }
}

/// Storage collaborator consumed by the core.
///
/// Implementations serialize their own writes and must be shareable across
/// threads; every method takes `&self`.
pub trait ReadingStore: Send + Sync {
    /// Persist a batch. Either every reading is stored or none is.
    fn insert_readings(&self, batch: &[Reading]) -> StorageResult<Vec<StoredReading>>;

    /// Matching readings, newest `collected_at` first, after applying `page`.
    fn query_readings(
        &self,
        filter: &ReadingFilter,
        page: PageRequest,
    ) -> StorageResult<Vec<StoredReading>>;

    /// Number of readings matching `filter`.
    fn count_readings(&self, filter: &ReadingFilter) -> StorageResult<usize>;

    /// Remove one reading. Returns whether it existed.
    fn delete_reading(&self, id: ReadingId) -> StorageResult<bool>;

    /// Visit every reading matching `filter`, in no particular order.
    ///
    /// The default walks [`query_readings`](Self::query_readings) in pages of
    /// [`SCAN_PAGE_SIZE`], so only one page is held in memory at a time.
    /// Readings inserted concurrently may shift page boundaries.
    fn scan_readings(
        &self,
        filter: &ReadingFilter,
        visit: &mut dyn FnMut(&StoredReading),
    ) -> StorageResult<()> {
        let mut offset = 0;
        loop {
            let page = self.query_readings(filter, PageRequest::new(offset, SCAN_PAGE_SIZE))?;
            for reading in &page {
                visit(reading);
            }

            if page.len() < SCAN_PAGE_SIZE {
                return Ok(());
            }
            offset += page.len();
        }
    }
}

impl<S: ReadingStore + ?Sized> ReadingStore for std::sync::Arc<S> {
    fn insert_readings(&self, batch: &[Reading]) -> StorageResult<Vec<StoredReading>> {
        (**self).insert_readings(batch)
    }

    fn query_readings(
        &self,
        filter: &ReadingFilter,
        page: PageRequest,
    ) -> StorageResult<Vec<StoredReading>> {
        (**self).query_readings(filter, page)
    }

    fn count_readings(&self, filter: &ReadingFilter) -> StorageResult<usize> {
        (**self).count_readings(filter)
    }

    fn delete_reading(&self, id: ReadingId) -> StorageResult<bool> {
        (**self).delete_reading(id)
    }

    fn scan_readings(
        &self,
        filter: &ReadingFilter,
        visit: &mut dyn FnMut(&StoredReading),
    ) -> StorageResult<()> {
        (**self).scan_readings(filter, visit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 7, 14, h, 0, 0).unwrap()
    }

    #[test]
    fn test_range_is_closed() {
        let range = TimeRange::between(at(1), at(3));
        assert!(range.contains(at(1)));
        assert!(range.contains(at(2)));
        assert!(range.contains(at(3)));
        assert!(!range.contains(at(0)));
        assert!(!range.contains(at(4)));
    }

    #[test]
    fn test_open_ranges() {
        let range = TimeRange {
            start: Some(at(2)),
            end: None,
        };
        assert!(range.contains(at(23)));
        assert!(!range.contains(at(1)));
        assert!(TimeRange::default().contains(at(0)));
    }

    #[test]
    fn test_inverted_range_is_empty() {
        assert!(TimeRange::between(at(3), at(1)).is_empty());
        assert!(!TimeRange::between(at(1), at(1)).is_empty());
        assert!(!TimeRange::default().is_empty());
    }

    #[test]
    fn test_filter_matches() {
        let reading = Reading::new(SensorId::new("a"), ParameterId::new("ph"), 7.0, at(5));

        assert!(ReadingFilter::new(SensorId::new("a")).matches(&reading));
        assert!(!ReadingFilter::new(SensorId::new("b")).matches(&reading));
        assert!(
            !ReadingFilter::new(SensorId::new("a"))
                .with_parameter(ParameterId::new("water_temperature"))
                .matches(&reading)
        );
        assert!(
            ReadingFilter::new(SensorId::new("a"))
                .with_parameter(ParameterId::new("ph"))
                .with_range(TimeRange::between(at(5), at(5)))
                .matches(&reading)
        );
    }

    #[test]
    fn test_page_request() {
        assert_eq!(PageRequest::page(1, 20), PageRequest::new(0, 20));
        assert_eq!(PageRequest::page(3, 14), PageRequest::new(28, 14));
    }
}
