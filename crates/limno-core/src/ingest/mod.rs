//! Measurement ingestion
//!
//! Decodes one compact telemetry line into a batch of [`Reading`]s:
//!
//! ```text
//! 2015-07-14T10:08:15-03:00;Tw=20.3;Ta:F=78.29;pH=6.9
//! └──────── timestamp ────┘ └─ code=value segments ─┘
//! ```
//!
//! Ingestion is all-or-nothing: a line produces either every reading or
//! exactly one error. Nothing here touches storage.

mod normalizer;
mod parser;
mod tokenizer;

pub use normalizer::{ValidationError, normalize};
pub use parser::{
    ASSIGNMENT, Measurement, MeasurementCode, ParsedLine, UNIT_QUALIFIER, parse_code, parse_line,
    parse_measurement, parse_timestamp,
};
pub use tokenizer::{SEGMENT_DELIMITER, Token, Tokenizer};

use log::{debug, warn};
use thiserror::Error;

use crate::parameters::ParameterRegistry;
use crate::reading::{Reading, SensorId};

/// Structural errors in an ingestion line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The leading segment is not an ISO-8601 timestamp with offset
    #[error("invalid timestamp {segment:?}")]
    InvalidTimestamp { segment: String },

    /// Nothing but the timestamp was sent
    #[error("line carries no measurements")]
    MissingMeasurements,

    /// A segment is not a single `code=number` pair
    #[error("malformed measurement {segment:?}")]
    MalformedMeasurement { segment: String },
}

impl ParseError {
    /// Stable error code for the boundary layer
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidTimestamp { .. } => "invalid_timestamp",
            Self::MissingMeasurements => "missing_measurements",
            Self::MalformedMeasurement { .. } => "malformed_measurement",
        }
    }
}

/// Any reason a line was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl IngestError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Parse(e) => e.code(),
            Self::Validation(e) => e.code(),
        }
    }
}

/// Parse and normalize one line for one sensor.
pub fn ingest_line(
    raw: &str,
    sensor: &SensorId,
    registry: &ParameterRegistry,
) -> Result<Vec<Reading>, IngestError> {
    let result = parse_line(raw)
        .map_err(IngestError::from)
        .and_then(|line| normalize(&line, sensor, registry).map_err(IngestError::from));

    match &result {
        Ok(readings) => debug!(
            "Decoded {} readings from sensor {}",
            readings.len(),
            sensor
        ),
        Err(e) => warn!("Rejected line from sensor {}: {}", sensor, e),
    }

    result
}
