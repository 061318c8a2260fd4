use thiserror::Error;

use super::ParsedLine;
use crate::parameters::ParameterRegistry;
use crate::reading::{Reading, SensorId};

/// Registry resolution failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The base code is not in the registry
    #[error("unknown parameter code {code:?}")]
    UnknownParameter { code: String },

    /// The base code is known but the unit qualifier is not
    #[error("unknown unit {unit:?} for parameter code {code:?}")]
    UnknownUnit { code: String, unit: String },

    /// The transform pushed the value out of the finite range
    #[error("value for {code:?} is out of range after conversion")]
    ValueOutOfRange { code: String },
}

impl ValidationError {
    /// Stable error code for the boundary layer
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownParameter { .. } => "unknown_parameter",
            Self::UnknownUnit { .. } => "unknown_unit",
            Self::ValueOutOfRange { .. } => "value_out_of_range",
        }
    }
}

/// Resolve every measurement of a parsed line into a [`Reading`].
///
/// Readings come out in input order and share the line's timestamp. The
/// first measurement that fails to resolve rejects the whole line.
pub fn normalize(
    line: &ParsedLine,
    sensor: &SensorId,
    registry: &ParameterRegistry,
) -> Result<Vec<Reading>, ValidationError> {
    line.tuples()
        .map(|(code, raw_value, collected_at)| {
            let def = registry
                .lookup(&code.base)
                .ok_or_else(|| ValidationError::UnknownParameter {
                    code: code.to_string(),
                })?;

            let transform = def.transform_for(code.unit.as_deref()).ok_or_else(|| {
                ValidationError::UnknownUnit {
                    code: code.base.clone(),
                    unit: code.unit.clone().unwrap_or_default(),
                }
            })?;

            let value = transform.apply(raw_value);
            if !value.is_finite() {
                return Err(ValidationError::ValueOutOfRange {
                    code: code.to_string(),
                });
            }

            Ok(Reading::new(
                sensor.clone(),
                def.id.clone(),
                value,
                collected_at,
            ))
        })
        .collect()
}
