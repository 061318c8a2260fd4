//! Host-independent core library for limno-rs
//!
//! This crate holds all the measurement logic of the telemetry service:
//! decoding compact sensor lines, resolving parameter codes through a
//! registry, bucketing readings by UTC hour or day, and folding buckets into
//! min/avg/max statistics. Storage is reached through the [`store::ReadingStore`]
//! trait, with an in-memory and a file-backed implementation provided.
//!
//! The library logs through the `log` facade and leaves the logger choice to
//! the host binary.

pub mod aggregate;
pub mod bucket;
pub mod config;
pub mod ingest;
pub mod parameters;
pub mod reading;
pub mod service;
pub mod store;

pub use bucket::{BucketKey, Resolution};
pub use config::CoreConfig;
pub use reading::{ParameterId, Reading, ReadingId, SensorId, StoredReading};
pub use service::MeasurementService;
