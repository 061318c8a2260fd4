use serde::{Deserialize, Serialize};

/// Conversion from a unit qualifier to a parameter's canonical unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    /// Value is already canonical
    Identity,
    /// °F → °C
    FahrenheitToCelsius,
    /// K → °C
    KelvinToCelsius,
    /// `value * scale + offset`
    Linear {
        scale: f64,
        #[serde(default)]
        offset: f64,
    },
}

impl Transform {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Self::Identity => value,
            Self::FahrenheitToCelsius => (value - 32.0) * 5.0 / 9.0,
            Self::KelvinToCelsius => value - 273.15,
            Self::Linear { scale, offset } => value * scale + offset,
        }
    }

    /// Whether the transform can only produce finite output for finite input.
    pub fn is_well_formed(self) -> bool {
        match self {
            Self::Linear { scale, offset } => scale.is_finite() && offset.is_finite(),
            _ => true,
        }
    }
}
