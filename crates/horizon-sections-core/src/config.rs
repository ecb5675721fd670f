//! Configuration for section trees.
//!
//! [`TreeConfig`] controls the few policy knobs of the composition engine.
//! It can be built in code or loaded from TOML:
//!
//! ```
//! use horizon_sections_core::TreeConfig;
//!
//! let config = TreeConfig::from_toml_str(r#"
//! reload_threshold = 256
//! verify_mapping = true
//! "#).unwrap();
//!
//! assert_eq!(config.reload_threshold, Some(256));
//! assert!(config.log_dropped_events);
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::targets;

/// Errors that can occur while loading a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The TOML text could not be parsed or did not match the schema.
    #[error("invalid tree configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be serialized.
    #[error("failed to serialize tree configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The configuration file could not be read.
    #[error("failed to read tree configuration '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Policy settings for a section tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// A batch that accumulates more operations than this is delivered as a
    /// full reload instead of discrete changes. `None` never forces a reload.
    pub reload_threshold: Option<usize>,
    /// Cross-check every mapping table rebuild against a plain traversal.
    pub verify_mapping: bool,
    /// Trace changes that reach a root with no observer attached.
    pub log_dropped_events: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            reload_threshold: None,
            verify_mapping: cfg!(debug_assertions),
            log_dropped_events: true,
        }
    }
}

impl TreeConfig {
    /// Parses a configuration from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        tracing::debug!(target: targets::CONFIG, ?config, "loaded tree configuration");
        Ok(config)
    }

    /// Reads a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Serializes the configuration to TOML text.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Sets the reload threshold.
    pub fn with_reload_threshold(mut self, threshold: usize) -> Self {
        self.reload_threshold = Some(threshold);
        self
    }

    /// Enables or disables mapping verification.
    pub fn with_verify_mapping(mut self, verify: bool) -> Self {
        self.verify_mapping = verify;
        self
    }
}
