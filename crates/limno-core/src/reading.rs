//! Reading domain entity
//!
//! A [`Reading`] is one measured value of one parameter, taken by one sensor
//! at one instant. Readings are created by the normalizer and never mutated;
//! once a store accepts them they carry a [`ReadingId`].

use core::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque sensor identifier.
///
/// Sensors are owned by an external registry; a reading only refers to one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(String);

impl SensorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SensorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SensorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Canonical parameter identifier, e.g. `water_temperature`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterId(String);

impl ParameterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ParameterId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParameterId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Storage-assigned reading identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadingId(pub u64);

impl Display for ReadingId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single measured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Sensor that took the measurement
    pub sensor: SensorId,
    /// Canonical parameter, resolved through the parameter registry
    pub parameter: ParameterId,
    /// Value in the parameter's canonical unit
    pub value: f64,
    /// Collection instant, normalized to UTC
    pub collected_at: DateTime<Utc>,
}

impl Reading {
    pub fn new(
        sensor: SensorId,
        parameter: ParameterId,
        value: f64,
        collected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sensor,
            parameter,
            value,
            collected_at,
        }
    }
}

impl Display for Reading {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "[Reading] sensor: {}, {}: {:.3} at {}",
            self.sensor,
            self.parameter,
            self.value,
            self.collected_at.to_rfc3339()
        )
    }
}

/// A reading that has been accepted by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    pub id: ReadingId,
    #[serde(flatten)]
    pub reading: Reading,
}

impl StoredReading {
    pub fn new(id: ReadingId, reading: Reading) -> Self {
        Self { id, reading }
    }
}
