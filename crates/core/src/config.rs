//! Wait configuration
//!
//! Controls how the optional timeout passed to every `*_when` operation is
//! interpreted:
//!
//! - `None` falls back to `default_timeout_ms`
//! - zero, or exactly `max_timeout_ms`, means "wait indefinitely"
//! - anything above `max_timeout_ms` is rejected with `IllegalArgument`

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest accepted timeout; doubles as the "no timeout" sentinel (~24.8 days)
pub const MAX_TIMEOUT_MS: u64 = (1 << 31) - 1;

/// Timeout policy for asynchronous waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Timeout applied when a caller passes none (0 = wait indefinitely)
    pub default_timeout_ms: u64,
    /// Sentinel maximum; requests above it are invalid
    pub max_timeout_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        WaitConfig {
            default_timeout_ms: 0,
            max_timeout_ms: MAX_TIMEOUT_MS,
        }
    }
}

impl WaitConfig {
    /// Config with an explicit default timeout
    pub fn with_default_timeout(timeout: Duration) -> Self {
        WaitConfig {
            default_timeout_ms: timeout.as_millis() as u64,
            ..Self::default()
        }
    }

    /// Check the config is self-consistent
    pub fn validate(&self) -> Result<()> {
        if self.max_timeout_ms == 0 {
            return Err(Error::illegal_argument("max_timeout_ms must be positive"));
        }
        if self.default_timeout_ms > self.max_timeout_ms {
            return Err(Error::illegal_argument(format!(
                "default_timeout_ms {} exceeds max_timeout_ms {}",
                self.default_timeout_ms, self.max_timeout_ms
            )));
        }
        Ok(())
    }

    /// Resolve a caller-supplied timeout into an effective deadline
    ///
    /// Returns `Ok(None)` for "wait indefinitely".
    pub fn resolve(&self, requested: Option<Duration>) -> Result<Option<Duration>> {
        let requested = match requested {
            Some(d) => d,
            None => Duration::from_millis(self.default_timeout_ms),
        };
        let max = Duration::from_millis(self.max_timeout_ms);
        if requested > max {
            return Err(Error::illegal_argument(format!(
                "timeout {:?} exceeds maximum {:?}",
                requested, max
            )));
        }
        if requested.is_zero() || requested == max {
            Ok(None)
        } else {
            Ok(Some(requested))
        }
    }
}
