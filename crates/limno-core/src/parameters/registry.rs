use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Transform;
use crate::ingest::{ASSIGNMENT, SEGMENT_DELIMITER, UNIT_QUALIFIER};
use crate::reading::ParameterId;

/// Errors raised while building a [`ParameterRegistry`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// A code is empty or contains a line-protocol delimiter
    #[error("invalid parameter code {code:?}")]
    InvalidCode { code: String },

    /// A unit qualifier is empty or contains a line-protocol delimiter
    #[error("invalid unit {unit:?} for parameter code {code:?}")]
    InvalidUnit { code: String, unit: String },

    /// A linear transform with a non-finite coefficient
    #[error("transform for {code}:{unit} has non-finite coefficients")]
    InvalidTransform { code: String, unit: String },

    /// The registry has no parameters at all
    #[error("parameter registry is empty")]
    Empty,
}

/// Registry entry for one parameter code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Canonical parameter identifier stored on readings
    pub id: ParameterId,
    /// Canonical unit; values without a qualifier are taken to be in it
    pub unit: String,
    /// Alternate unit qualifiers and their conversion to `unit`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub units: BTreeMap<String, Transform>,
}

impl ParameterDef {
    pub fn new(id: &str, unit: &str) -> Self {
        Self {
            id: ParameterId::new(id),
            unit: unit.to_owned(),
            units: BTreeMap::new(),
        }
    }

    pub fn with_unit(mut self, unit: &str, transform: Transform) -> Self {
        self.units.insert(unit.to_owned(), transform);
        self
    }

    /// Transform for a unit qualifier.
    ///
    /// No qualifier, or the canonical unit itself, maps to
    /// [`Transform::Identity`]. Unknown qualifiers map to `None`.
    pub fn transform_for(&self, unit: Option<&str>) -> Option<Transform> {
        match unit {
            None => Some(Transform::Identity),
            Some(unit) if unit == self.unit => Some(Transform::Identity),
            Some(unit) => self.units.get(unit).copied(),
        }
    }
}

/// Immutable mapping from wire codes to canonical parameters.
///
/// Built once at startup (from configuration or [`ParameterRegistry::default`])
/// and handed to the normalizer by reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParameterRegistry {
    by_code: BTreeMap<String, ParameterDef>,
}

impl ParameterRegistry {
    /// Build a registry from code → definition pairs, validating every entry.
    pub fn from_definitions(
        definitions: BTreeMap<String, ParameterDef>,
    ) -> Result<Self, RegistryError> {
        if definitions.is_empty() {
            return Err(RegistryError::Empty);
        }

        for (code, def) in &definitions {
            if !is_valid_token(code) {
                return Err(RegistryError::InvalidCode { code: code.clone() });
            }

            if !is_valid_token(&def.unit) {
                return Err(RegistryError::InvalidUnit {
                    code: code.clone(),
                    unit: def.unit.clone(),
                });
            }

            for (unit, transform) in &def.units {
                if !is_valid_token(unit) {
                    return Err(RegistryError::InvalidUnit {
                        code: code.clone(),
                        unit: unit.clone(),
                    });
                }
                if !transform.is_well_formed() {
                    return Err(RegistryError::InvalidTransform {
                        code: code.clone(),
                        unit: unit.clone(),
                    });
                }
            }
        }

        Ok(Self {
            by_code: definitions,
        })
    }

    /// Look up a base code (without unit qualifier).
    pub fn lookup(&self, code: &str) -> Option<&ParameterDef> {
        self.by_code.get(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterDef)> {
        self.by_code.iter().map(|(code, def)| (code.as_str(), def))
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

impl Default for ParameterRegistry {
    fn default() -> Self {
        Self {
            by_code: builtin_definitions(),
        }
    }
}

fn is_valid_token(token: &str) -> bool {
    !token.is_empty()
        && !token.contains([SEGMENT_DELIMITER, ASSIGNMENT, UNIT_QUALIFIER])
        && token.trim() == token
}

/// Parameters understood by the stock field units.
pub fn builtin_definitions() -> BTreeMap<String, ParameterDef> {
    let celsius = |id| {
        ParameterDef::new(id, "C")
            .with_unit("F", Transform::FahrenheitToCelsius)
            .with_unit("K", Transform::KelvinToCelsius)
    };

    BTreeMap::from([
        ("Tw".to_owned(), celsius("water_temperature")),
        ("Ta".to_owned(), celsius("ambient_temperature")),
        ("pH".to_owned(), ParameterDef::new("ph", "pH")),
        (
            "Pa".to_owned(),
            ParameterDef::new("atmospheric_pressure", "hPa")
                .with_unit(
                    "kPa",
                    Transform::Linear {
                        scale: 10.0,
                        offset: 0.0,
                    },
                )
                .with_unit(
                    "mmHg",
                    Transform::Linear {
                        scale: 1.333_22,
                        offset: 0.0,
                    },
                ),
        ),
        ("RH".to_owned(), ParameterDef::new("relative_humidity", "%")),
        ("DO".to_owned(), ParameterDef::new("dissolved_oxygen", "mg/L")),
        (
            "EC".to_owned(),
            ParameterDef::new("electrical_conductivity", "uS/cm").with_unit(
                "mS/cm",
                Transform::Linear {
                    scale: 1000.0,
                    offset: 0.0,
                },
            ),
        ),
    ])
}
