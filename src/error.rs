//! Unified error types for strata-sync.
//!
//! This module provides a clean error type that wraps coordination errors
//! and adds the failures of the outer layer (configuration, registry).

use thiserror::Error;

/// All strata-sync errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A coordination primitive failed
    #[error(transparent)]
    Coordination(#[from] strata_sync_core::Error),

    /// Configuration could not be read or parsed
    #[error("config error: {0}")]
    Config(String),

    /// Capability missing from the registry, or registered with another type
    #[error("capability error: {0}")]
    Capability(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for strata-sync operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The underlying coordination error, if any
    pub fn coordination(&self) -> Option<&strata_sync_core::Error> {
        match self {
            Error::Coordination(e) => Some(e),
            _ => None,
        }
    }

    /// Check if this is a bounded wait that timed out
    pub fn is_timeout(&self) -> bool {
        self.coordination().map_or(false, |e| e.is_timeout())
    }

    /// Check if this is a closed-cell failure
    pub fn is_closed(&self) -> bool {
        self.coordination().map_or(false, |e| e.is_closed())
    }

    /// Check if this is a registry failure
    pub fn is_capability(&self) -> bool {
        matches!(self, Error::Capability(_))
    }

    /// Check if this is a configuration failure
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
