//! Line parser
//!
//! Turns the tokens produced by [`Tokenizer`] into a [`ParsedLine`]. Each
//! grammar rule has its own function so the failure modes can be exercised
//! on their own:
//!
//! - [`parse_timestamp`]: ISO-8601 timestamp with offset, normalized to UTC.
//!   RFC 3339 plus basic offsets (`-0300`) and minute precision
//!   (`10:08-03:00`, `10:08Z`). A timestamp without an offset is rejected.
//! - [`parse_measurement`]: `code=value` with exactly one `=`
//! - [`parse_code`]: `base` or `base:unit`

use core::fmt::Display;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ParseError;
use super::tokenizer::{Token, Tokenizer};

/// Separates a measurement code from its value.
pub const ASSIGNMENT: char = '=';

/// Separates a parameter code from its unit qualifier (`Ta:F`).
pub const UNIT_QUALIFIER: char = ':';

/// A measurement code as written on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeasurementCode {
    /// Registry code, e.g. `Ta`
    pub base: String,
    /// Optional unit qualifier, e.g. `F`
    pub unit: Option<String>,
}

impl MeasurementCode {
    pub fn new(base: impl Into<String>, unit: Option<&str>) -> Self {
        Self {
            base: base.into(),
            unit: unit.map(str::to_owned),
        }
    }
}

impl Display for MeasurementCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.unit {
            Some(unit) => write!(f, "{}{}{}", self.base, UNIT_QUALIFIER, unit),
            None => f.write_str(&self.base),
        }
    }
}

/// One `code=value` segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub code: MeasurementCode,
    /// Raw value, before any unit transform
    pub value: f64,
}

/// A structurally valid ingestion line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedLine {
    /// Collection instant shared by every measurement of the line
    pub timestamp: DateTime<Utc>,
    /// Measurements in input order, never empty
    pub measurements: Vec<Measurement>,
}

impl ParsedLine {
    /// `(code, value, timestamp)` tuples in input order.
    pub fn tuples(&self) -> impl Iterator<Item = (&MeasurementCode, f64, DateTime<Utc>)> + '_ {
        self.measurements
            .iter()
            .map(|m| (&m.code, m.value, self.timestamp))
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

/// Parse one raw ingestion line.
///
/// The first structural error aborts the whole line.
pub fn parse_line(raw: &str) -> Result<ParsedLine, ParseError> {
    let mut timestamp = None;
    let mut measurements = Vec::new();

    // The tokenizer always yields the timestamp token first, so the timestamp
    // is validated before any measurement is looked at.
    for token in Tokenizer::new(raw) {
        match token {
            Token::Timestamp(segment) => timestamp = Some(parse_timestamp(segment)?),
            Token::Segment(segment) => measurements.push(parse_measurement(segment)?),
        }
    }

    let timestamp = timestamp.ok_or_else(|| ParseError::InvalidTimestamp {
        segment: String::new(),
    })?;

    if measurements.is_empty() {
        return Err(ParseError::MissingMeasurements);
    }

    Ok(ParsedLine {
        timestamp,
        measurements,
    })
}

/// ISO-8601 layouts with a numeric offset tried after RFC 3339
const OFFSET_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%dT%H:%M%:z",
];

/// Minute-precision UTC layout
const UTC_MINUTE_FORMAT: &str = "%Y-%m-%dT%H:%MZ";

/// Parse an ISO-8601 timestamp carrying an explicit offset.
pub fn parse_timestamp(segment: &str) -> Result<DateTime<Utc>, ParseError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(segment) {
        return Ok(instant.with_timezone(&Utc));
    }

    OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(segment, format).ok())
        .map(|instant| instant.with_timezone(&Utc))
        .or_else(|| {
            NaiveDateTime::parse_from_str(segment, UTC_MINUTE_FORMAT)
                .ok()
                .map(|naive| naive.and_utc())
        })
        .ok_or_else(|| ParseError::InvalidTimestamp {
            segment: segment.to_owned(),
        })
}

/// Parse a single `code=value` segment.
pub fn parse_measurement(segment: &str) -> Result<Measurement, ParseError> {
    let malformed = || ParseError::MalformedMeasurement {
        segment: segment.to_owned(),
    };

    let mut parts = segment.split(ASSIGNMENT);
    let (code, value) = match (parts.next(), parts.next(), parts.next()) {
        (Some(code), Some(value), None) => (code.trim(), value.trim()),
        _ => return Err(malformed()),
    };

    let code = parse_code(code).ok_or_else(malformed)?;
    let value = value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(malformed)?;

    Ok(Measurement { code, value })
}

/// Parse a measurement code, returning `None` when it is empty or carries an
/// empty or repeated unit qualifier.
pub fn parse_code(code: &str) -> Option<MeasurementCode> {
    let (base, unit) = match code.split_once(UNIT_QUALIFIER) {
        Some((base, unit)) => {
            if unit.is_empty() || unit.contains(UNIT_QUALIFIER) {
                return None;
            }
            (base, Some(unit))
        }
        None => (code, None),
    };

    if base.is_empty() {
        return None;
    }

    Some(MeasurementCode::new(base, unit))
}
