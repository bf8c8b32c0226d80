//! Engine configuration, loaded from an optional TOML file
//!
//! Every key is optional; a missing file yields the defaults.
//!
//! ```toml
//! data_root = "web/maps"
//! dimensions = ["world", "world_nether", "world_the_end"]
//! debounce_ms = 1000
//! sea_level = 64.0
//! meta_file = "markers_meta.json"
//!
//! [io_retry]
//! attempts = 3
//! backoff_ms = 50
//! ```

use crate::model::Dimension;
use crate::storage::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Could not parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory holding one subdirectory per dimension
    pub data_root: PathBuf,
    /// Dimensions to synchronize; the order breaks ties
    pub dimensions: Vec<Dimension>,
    /// Quiet period after a change before a cycle runs
    pub debounce_ms: u64,
    /// Height given to markers stored without one
    pub sea_level: f64,
    /// Allocator metadata file name, relative to `data_root`
    pub meta_file: String,
    pub io_retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("web/maps"),
            dimensions: ["world", "world_nether", "world_the_end"]
                .into_iter()
                .map(Dimension::from)
                .collect(),
            debounce_ms: 1000,
            sea_level: 64.0,
            meta_file: "markers_meta.json".to_string(),
            io_retry: RetryPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Load from `path`, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config = Self::parse(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Default config file location under the user's config directory
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".config"))
            .join("livemark")
            .join("livemark.toml")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dimensions.is_empty() {
            return Err(ConfigError::Invalid("at least one dimension is required".into()));
        }
        let mut seen = HashSet::new();
        for dimension in &self.dimensions {
            if !seen.insert(dimension) {
                return Err(ConfigError::Invalid(format!("dimension {dimension} listed twice")));
            }
        }
        if !self.sea_level.is_finite() {
            return Err(ConfigError::Invalid("sea_level must be a finite number".into()));
        }
        if self.meta_file.trim().is_empty() {
            return Err(ConfigError::Invalid("meta_file must not be empty".into()));
        }
        Ok(())
    }

    pub fn meta_path(&self) -> PathBuf {
        self.data_root.join(&self.meta_file)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
