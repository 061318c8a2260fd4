//! Measurement query façade
//!
//! [`MeasurementService`] ties the pieces together for a host: it owns the
//! parameter registry, the query limits and a storage collaborator, and
//! exposes the four operations a measurement endpoint needs.

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::{Aggregate, AggregationWindow, aggregate_query};
use crate::bucket::Resolution;
use crate::config::QueryConfig;
use crate::ingest::{IngestError, ingest_line};
use crate::parameters::ParameterRegistry;
use crate::reading::{ParameterId, ReadingId, SensorId, StoredReading};
use crate::store::{PageRequest, ReadingFilter, ReadingStore, StorageError, TimeRange};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Pages are numbered from 1
    #[error("page must be at least 1")]
    InvalidPage,

    #[error("per_page must be between 1 and {max}, got {per_page}")]
    InvalidPerPage { per_page: usize, max: usize },

    #[error("aggregation range spans more than {max_days} days")]
    RangeTooLarge { max_days: u32 },
}

impl QueryError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Ingest(e) => e.code(),
            Self::Storage(_) => "storage_failure",
            Self::InvalidPage => "invalid_page",
            Self::InvalidPerPage { .. } => "invalid_per_page",
            Self::RangeTooLarge { .. } => "range_too_large",
        }
    }
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Readings accepted from one line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub readings: Vec<StoredReading>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingsQuery {
    pub sensor: SensorId,
    pub parameter: Option<ParameterId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// 1-based; defaults to the first page
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl ReadingsQuery {
    pub fn new(sensor: SensorId) -> Self {
        Self {
            sensor,
            parameter: None,
            from: None,
            to: None,
            page: None,
            per_page: None,
        }
    }

    fn filter(&self) -> ReadingFilter {
        let filter = ReadingFilter::new(self.sensor.clone()).with_range(TimeRange {
            start: self.from,
            end: self.to,
        });
        match &self.parameter {
            Some(parameter) => filter.with_parameter(parameter.clone()),
            None => filter,
        }
    }
}

/// One page of readings, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingPage {
    pub readings: Vec<StoredReading>,
    /// Matching readings across all pages
    pub count: usize,
    pub page: usize,
    pub per_page: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateQuery {
    pub sensor: SensorId,
    pub parameter: ParameterId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub resolution: Resolution,
}

/// Aggregation result, echoing the request it answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub sensor: SensorId,
    pub parameter: ParameterId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub resolution: Resolution,
    pub aggregates: Vec<Aggregate>,
    pub count: usize,
}

pub struct MeasurementService<S> {
    registry: ParameterRegistry,
    limits: QueryConfig,
    store: S,
}

impl<S: ReadingStore> MeasurementService<S> {
    pub fn new(registry: ParameterRegistry, limits: QueryConfig, store: S) -> Self {
        Self {
            registry,
            limits,
            store,
        }
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    pub fn limits(&self) -> &QueryConfig {
        &self.limits
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decode one line and store every reading it carries.
    pub fn ingest(&self, sensor: &SensorId, line: &str) -> QueryResult<IngestReport> {
        let readings = ingest_line(line, sensor, &self.registry)?;
        let readings = self.store.insert_readings(&readings)?;
        Ok(IngestReport { readings })
    }

    pub fn list(&self, query: &ReadingsQuery) -> QueryResult<ReadingPage> {
        let page = query.page.unwrap_or(1);
        if page == 0 {
            return Err(QueryError::InvalidPage);
        }

        let per_page = query.per_page.unwrap_or(self.limits.default_per_page);
        if per_page == 0 || per_page > self.limits.max_per_page {
            return Err(QueryError::InvalidPerPage {
                per_page,
                max: self.limits.max_per_page,
            });
        }

        let filter = query.filter();
        let count = self.store.count_readings(&filter)?;
        let readings = self
            .store
            .query_readings(&filter, PageRequest::page(page, per_page))?;

        debug!(
            "Listed {} of {} readings for sensor {} (page {})",
            readings.len(),
            count,
            query.sensor,
            page
        );

        Ok(ReadingPage {
            readings,
            count,
            page,
            per_page,
        })
    }

    pub fn aggregate(&self, query: &AggregateQuery) -> QueryResult<AggregateReport> {
        if let Some(max_days) = self.limits.max_aggregate_span_days
            && query.end - query.start > TimeDelta::days(i64::from(max_days))
        {
            return Err(QueryError::RangeTooLarge { max_days });
        }

        let window = AggregationWindow {
            sensor: query.sensor.clone(),
            parameter: query.parameter.clone(),
            start: query.start,
            end: query.end,
            resolution: query.resolution,
        };
        let result = aggregate_query(&self.store, &window)?;

        Ok(AggregateReport {
            sensor: window.sensor,
            parameter: window.parameter,
            start: window.start,
            end: window.end,
            resolution: window.resolution,
            aggregates: result.aggregates,
            count: result.count,
        })
    }

    /// Remove one reading. Returns whether it existed.
    pub fn delete(&self, id: ReadingId) -> QueryResult<bool> {
        let removed = self.store.delete_reading(id)?;
        if removed {
            info!("Deleted reading {}", id);
        }
        Ok(removed)
    }
}
