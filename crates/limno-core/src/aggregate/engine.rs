use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use super::RunningStats;
use crate::bucket::{BucketKey, Resolution, bucket_key};
use crate::reading::{ParameterId, Reading, SensorId};
use crate::store::{ReadingFilter, ReadingStore, StorageResult, TimeRange};

/// Statistics for one non-empty bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub key: BucketKey,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    /// Always at least 1
    pub count: u64,
}

impl Aggregate {
    fn from_stats(key: BucketKey, stats: &RunningStats) -> Self {
        Self {
            key,
            min: stats.min(),
            max: stats.max(),
            avg: stats.avg(),
            count: stats.count(),
        }
    }
}

/// Outcome of an aggregation query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    /// One entry per non-empty bucket, in ascending bucket order
    pub aggregates: Vec<Aggregate>,
    /// Number of readings in the range, independent of bucketing
    pub count: usize,
}

impl AggregationResult {
    pub fn empty() -> Self {
        Self {
            aggregates: Vec::new(),
            count: 0,
        }
    }
}

/// Incremental bucket fold.
///
/// Readings can be pushed in any order; only one [`RunningStats`] per bucket
/// is held, never the readings themselves.
#[derive(Debug, Clone)]
pub struct Aggregator {
    resolution: Resolution,
    buckets: BTreeMap<BucketKey, RunningStats>,
    count: usize,
}

impl Aggregator {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            buckets: BTreeMap::new(),
            count: 0,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn push(&mut self, collected_at: DateTime<Utc>, value: f64) {
        self.count += 1;
        self.buckets
            .entry(bucket_key(collected_at, self.resolution))
            .and_modify(|stats| stats.push(value))
            .or_insert_with(|| RunningStats::new(value));
    }

    pub fn push_reading(&mut self, reading: &Reading) {
        self.push(reading.collected_at, reading.value);
    }

    /// Readings folded so far
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn finish(self) -> AggregationResult {
        AggregationResult {
            aggregates: self
                .buckets
                .iter()
                .map(|(key, stats)| Aggregate::from_stats(*key, stats))
                .collect(),
            count: self.count,
        }
    }
}

/// Group readings into buckets and fold each bucket.
pub fn aggregate<'a, I>(readings: I, resolution: Resolution) -> Vec<Aggregate>
where
    I: IntoIterator<Item = &'a Reading>,
{
    let mut aggregator = Aggregator::new(resolution);
    for reading in readings {
        aggregator.push_reading(reading);
    }
    aggregator.finish().aggregates
}

/// Sensor, parameter and closed time range to aggregate over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationWindow {
    pub sensor: SensorId,
    pub parameter: ParameterId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub resolution: Resolution,
}

impl AggregationWindow {
    pub fn filter(&self) -> ReadingFilter {
        ReadingFilter::new(self.sensor.clone())
            .with_parameter(self.parameter.clone())
            .with_range(TimeRange::between(self.start, self.end))
    }
}

/// Aggregate every reading of the window's sensor and parameter with
/// `start <= collected_at <= end`.
///
/// The whole range is consumed through [`ReadingStore::scan_readings`];
/// callers are responsible for bounding its size. A start after the end is
/// an empty range.
pub fn aggregate_query<S>(source: &S, window: &AggregationWindow) -> StorageResult<AggregationResult>
where
    S: ReadingStore + ?Sized,
{
    if window.start > window.end {
        debug!(
            "Empty aggregation range {} > {} for sensor {}",
            window.start, window.end, window.sensor
        );
        return Ok(AggregationResult::empty());
    }

    let mut aggregator = Aggregator::new(window.resolution);
    source.scan_readings(&window.filter(), &mut |row| {
        aggregator.push_reading(&row.reading)
    })?;

    let result = aggregator.finish();
    debug!(
        "Aggregated {} readings of {}/{} into {} {} buckets",
        result.count,
        window.sensor,
        window.parameter,
        result.aggregates.len(),
        window.resolution
    );
    Ok(result)
}
