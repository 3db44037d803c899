//! Server configuration
//!
//! Loadable from TOML or YAML; every field has a default so partial files work.

use reconf_property::DEFAULT_MAX_DEPTH;
use reconf_schema::RangePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Name the server is registered under
    pub service_name: String,
    /// Bound on the number of segments in any property path
    pub max_depth: usize,
    /// Handling of out-of-range numeric values
    pub range_policy: RangePolicy,
    /// Buffered events per subscriber before lagging
    pub event_capacity: usize,
    /// Level assigned to parameters of an auto-derived schema
    pub auto_schema_level: u32,
}

impl ServerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With service name
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// With maximum path depth
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// With range policy
    #[inline]
    #[must_use]
    pub fn with_range_policy(mut self, policy: RangePolicy) -> Self {
        self.range_policy = policy;
        self
    }

    /// With event channel capacity
    #[inline]
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// With level for auto-derived parameters
    #[inline]
    #[must_use]
    pub fn with_auto_schema_level(mut self, level: u32) -> Self {
        self.auto_schema_level = level;
        self
    }

    /// Parse TOML
    ///
    /// # Errors
    /// [`ConfigError::Toml`] on syntax errors or unknown keys.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Parse YAML
    ///
    /// # Errors
    /// [`ConfigError::Yaml`] on syntax errors or unknown keys.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load from a `.toml`, `.yaml` or `.yml` file
    ///
    /// # Errors
    /// - [`ConfigError::Io`] if the file cannot be read
    /// - [`ConfigError::UnsupportedFormat`] for any other extension
    /// - parse errors as in [`Self::from_toml`] / [`Self::from_yaml`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&text),
            Some("yaml" | "yml") => Self::from_yaml(&text),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service_name: "reconfigure".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            range_policy: RangePolicy::Reject,
            event_capacity: 64,
            auto_schema_level: 0,
        }
    }
}

/// Errors while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid TOML
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid YAML
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Extension is neither TOML nor YAML
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),
}
