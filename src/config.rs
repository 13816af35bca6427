//! Configuration for strata-sync.
//!
//! Configuration is read from TOML. Every key is optional:
//!
//! ```toml
//! [wait]
//! default_timeout_ms = 0        # 0 = wait indefinitely
//! max_timeout_ms = 2147483647   # sentinel maximum
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use strata_sync_core::WaitConfig;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Timeout policy shared by every primitive created from this config
    pub wait: WaitConfig,
}

impl Config {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Check the configuration is self-consistent
    pub fn validate(&self) -> Result<()> {
        self.wait
            .validate()
            .map_err(|e| Error::Config(e.to_string()))
    }
}
