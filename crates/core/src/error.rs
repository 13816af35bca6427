//! Error types for the coordination primitives
//!
//! Every fallible operation in the workspace reports one of these variants:
//!
//! | Variant | Raised when |
//! |---------|-------------|
//! | IllegalArgument | Malformed input (unknown state, over-range timeout) |
//! | IllegalState | Operation forbidden in the current state |
//! | Closed | Waitable shut down before or during the operation |
//! | Timeout | Bounded wait exceeded its deadline |
//! | TransitionRejected | Guarded transition disallowed, no failure value given |
//! | Wrapped | Foreign error re-raised in a coordination context |
//! | Aggregate | Several failures reported together |
//!
//! Errors are `Clone` so a failed `Completion` can be replayed to any number
//! of observers.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for coordination operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coordination error
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Malformed input
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// Operation attempted in a state that forbids it
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Operation attempted on, or interrupted by, a closed waitable
    #[error("closed: {0}")]
    Closed(String),

    /// Bounded wait exceeded its deadline
    #[error("timed out after {timeout_ms}ms")]
    Timeout {
        /// Requested timeout in milliseconds
        timeout_ms: u64,
    },

    /// Guarded transition was disallowed
    #[error("transition '{event}' from {from} to {to} not allowed")]
    TransitionRejected {
        /// Event name that drove the transition
        event: String,
        /// State the machine was in
        from: String,
        /// Requested goal state
        to: String,
    },

    /// Foreign error, message preserved
    #[error("{message}")]
    Wrapped {
        /// Display text of the wrapped error
        message: String,
        /// The wrapped error itself
        cause: Option<Arc<dyn StdError + Send + Sync>>,
    },

    /// Several errors merged into one
    #[error("{} errors: {}", .0.len(), join_messages(.0))]
    Aggregate(Vec<Error>),
}

fn join_messages(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create an IllegalArgument error
    pub fn illegal_argument(msg: impl Into<String>) -> Self {
        Error::IllegalArgument(msg.into())
    }

    /// Create an IllegalState error
    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Error::IllegalState(msg.into())
    }

    /// Create a Closed error
    pub fn closed(msg: impl Into<String>) -> Self {
        Error::Closed(msg.into())
    }

    /// Create a TransitionRejected error from any displayable states
    pub fn transition_rejected(
        event: impl Into<String>,
        from: impl fmt::Debug,
        to: impl fmt::Debug,
    ) -> Self {
        Error::TransitionRejected {
            event: event.into(),
            from: format!("{:?}", from),
            to: format!("{:?}", to),
        }
    }

    /// Wrap a foreign error, keeping its message and the error itself
    pub fn wrap<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error::Wrapped {
            message: err.to_string(),
            cause: Some(Arc::new(err)),
        }
    }

    /// Wrap a bare message as a foreign failure
    pub fn message(msg: impl Into<String>) -> Self {
        Error::Wrapped {
            message: msg.into(),
            cause: None,
        }
    }

    /// Merge several errors into one
    ///
    /// Nested aggregates are flattened. A single error is returned as-is.
    ///
    /// Returns `None` when `errors` is empty.
    pub fn aggregate(errors: impl IntoIterator<Item = Error>) -> Option<Self> {
        let mut flat = Vec::new();
        for e in errors {
            match e {
                Error::Aggregate(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Error::Aggregate(flat)),
        }
    }

    /// The wrapped foreign error, if any
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Error::Wrapped { cause: Some(c), .. } => Some(c.as_ref()),
            _ => None,
        }
    }

    /// Check if this is an IllegalArgument error
    pub fn is_illegal_argument(&self) -> bool {
        matches!(self, Error::IllegalArgument(_))
    }

    /// Check if this is an IllegalState error
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Error::IllegalState(_))
    }

    /// Check if this is a Closed error
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed(_))
    }

    /// Check if this is a Timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Check if this is a TransitionRejected error
    pub fn is_transition_rejected(&self) -> bool {
        matches!(self, Error::TransitionRejected { .. })
    }
}
