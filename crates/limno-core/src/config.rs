//! Service configuration
//!
//! Loaded once at startup from a JSON file:
//!
//! ```json
//! {
//!   "parameters": {
//!     "Tw": { "id": "water_temperature", "unit": "C",
//!             "units": { "F": { "kind": "fahrenheit_to_celsius" } } }
//!   },
//!   "query": { "default_per_page": 20, "max_per_page": 100,
//!              "max_aggregate_span_days": 92 }
//! }
//! ```
//!
//! Every section is optional. Without `parameters` the built-in registry is
//! used.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parameters::{ParameterDef, ParameterRegistry, RegistryError};

/// Page size when a listing request does not name one
pub const DEFAULT_PER_PAGE: usize = 20;

/// Upper bound on a listing page size
pub const DEFAULT_MAX_PER_PAGE: usize = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    pub default_per_page: usize,
    pub max_per_page: usize,
    /// Longest accepted aggregation range; `None` leaves it unbounded
    pub max_aggregate_span_days: Option<u32>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_per_page: DEFAULT_PER_PAGE,
            max_per_page: DEFAULT_MAX_PER_PAGE,
            max_aggregate_span_days: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    /// Parameter registry definition, keyed by wire code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, ParameterDef>>,
    pub query: QueryConfig,
}

impl CoreConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let query = &self.query;
        if query.max_per_page == 0 {
            return Err(ConfigError::Invalid("query.max_per_page must be at least 1"));
        }
        if query.default_per_page == 0 || query.default_per_page > query.max_per_page {
            return Err(ConfigError::Invalid(
                "query.default_per_page must be between 1 and query.max_per_page",
            ));
        }
        if query.max_aggregate_span_days == Some(0) {
            return Err(ConfigError::Invalid(
                "query.max_aggregate_span_days must be at least 1",
            ));
        }
        Ok(())
    }

    /// Build the parameter registry this configuration describes.
    pub fn registry(&self) -> Result<ParameterRegistry, ConfigError> {
        match &self.parameters {
            Some(definitions) => Ok(ParameterRegistry::from_definitions(definitions.clone())?),
            None => Ok(ParameterRegistry::default()),
        }
    }
}
