//! Completion record and completion states
//!
//! A `Completion` is the immutable outcome a producer hands to a
//! completable: a state, plus the value on success or the error on failure.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Completion lifecycle state
///
/// `Pending` is the only non-terminal state; every other state is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionState {
    /// Not yet completed
    Pending,
    /// Completed with an error
    Failed,
    /// Completed by cancellation
    Cancelled,
    /// Completed with a value
    Succeeded,
}

impl CompletionState {
    /// Every completion state
    pub const ALL: [CompletionState; 4] = [
        CompletionState::Pending,
        CompletionState::Failed,
        CompletionState::Cancelled,
        CompletionState::Succeeded,
    ];

    /// Terminal states reachable from `Pending`
    pub const TERMINAL: [CompletionState; 3] = [
        CompletionState::Failed,
        CompletionState::Cancelled,
        CompletionState::Succeeded,
    ];

    /// Check if this state is final
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CompletionState::Pending)
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionState::Pending => "Pending",
            CompletionState::Failed => "Failed",
            CompletionState::Cancelled => "Cancelled",
            CompletionState::Succeeded => "Succeeded",
        }
    }
}

impl std::fmt::Display for CompletionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opaque identifier of the producer-side handle a completion settles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompletionHandle(u64);

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

impl CompletionHandle {
    /// Allocate a fresh, process-unique handle
    pub fn next() -> Self {
        CompletionHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Immutable completion record
#[derive(Debug, Clone)]
pub struct Completion<T> {
    state: CompletionState,
    value: Option<T>,
    thrown: Option<Error>,
    handle: Option<CompletionHandle>,
}

impl<T> Completion<T> {
    /// Create a completion from its parts
    pub fn new(state: CompletionState, value: Option<T>, thrown: Option<Error>) -> Self {
        Completion {
            state,
            value,
            thrown,
            handle: None,
        }
    }

    /// A pending (non-terminal) completion
    pub fn pending() -> Self {
        Self::new(CompletionState::Pending, None, None)
    }

    /// A successful completion carrying `value`
    pub fn succeeded(value: T) -> Self {
        Self::new(CompletionState::Succeeded, Some(value), None)
    }

    /// A failed completion carrying `error`
    pub fn failed(error: Error) -> Self {
        Self::new(CompletionState::Failed, None, Some(error))
    }

    /// A cancelled completion
    pub fn cancelled() -> Self {
        Self::new(CompletionState::Cancelled, None, None)
    }

    /// Attach the producer-side handle this completion settles
    pub fn with_handle(mut self, handle: CompletionHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Completion state
    pub fn state(&self) -> CompletionState {
        self.state
    }

    /// Value, if any
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Error, if any
    pub fn thrown(&self) -> Option<&Error> {
        self.thrown.as_ref()
    }

    /// Producer-side handle, if any
    pub fn handle(&self) -> Option<CompletionHandle> {
        self.handle
    }

    /// Check if the state is terminal
    pub fn is_completed(&self) -> bool {
        self.state.is_terminal()
    }

    /// Consume into a `Result`
    ///
    /// Pending and cancelled completions have no result and map to an
    /// `IllegalState` error; a succeeded completion without a value does too.
    pub fn into_result(self) -> crate::Result<T> {
        match (self.state, self.value, self.thrown) {
            (CompletionState::Succeeded, Some(v), _) => Ok(v),
            (CompletionState::Failed, _, Some(e)) => Err(e),
            (state, _, _) => Err(Error::illegal_state(format!(
                "completion in state {} carries no result",
                state
            ))),
        }
    }
}
