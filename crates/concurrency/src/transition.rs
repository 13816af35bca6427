//! One-shot transition descriptors
//!
//! A `Transition` bundles a guarded state change with what should happen on
//! each of its three outcomes:
//!
//! | Outcome | Trigger | Effect |
//! |---------|---------|--------|
//! | success | guarded set happened, producer returned `Ok` | success value |
//! | error | guarded set happened, producer returned `Err` | error state, error value or the error |
//! | failure | guarded set was disallowed | failure state, failure value or `TransitionRejected` |
//!
//! Producers may borrow from the caller's stack; a descriptor is consumed by
//! exactly one call to `StateMachine::transition`.

use strata_sync_core::{Error, Result};

pub(crate) type SuccessFn<'a, R> = Box<dyn FnOnce() -> Result<R> + 'a>;
pub(crate) type ErrorFn<'a, R> = Box<dyn FnOnce(Error) -> R + 'a>;
pub(crate) type FailureFn<'a, R> = Box<dyn FnOnce() -> R + 'a>;

/// Guarded state change with per-outcome targets and value producers
pub struct Transition<'a, S, R> {
    pub(crate) event: String,
    pub(crate) goal: S,
    pub(crate) error_state: Option<S>,
    pub(crate) failure_state: Option<S>,
    pub(crate) on_success: Option<SuccessFn<'a, R>>,
    pub(crate) on_error: Option<ErrorFn<'a, R>>,
    pub(crate) on_failure: Option<FailureFn<'a, R>>,
}

impl<'a, S, R> Transition<'a, S, R> {
    /// Transition to `goal` driven by `event`
    pub fn new(event: impl Into<String>, goal: S) -> Self {
        Transition {
            event: event.into(),
            goal,
            error_state: None,
            failure_state: None,
            on_success: None,
            on_error: None,
            on_failure: None,
        }
    }

    /// State to move to when the success producer fails
    pub fn error_state(mut self, state: S) -> Self {
        self.error_state = Some(state);
        self
    }

    /// State to move to when the guarded set is disallowed
    pub fn failure_state(mut self, state: S) -> Self {
        self.failure_state = Some(state);
        self
    }

    /// Produce the success value after the guarded set
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Result<R> + 'a,
    {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Turn a failed success producer into a value instead of an error
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Error) -> R + 'a,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Produce a value instead of `TransitionRejected` when disallowed
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> R + 'a,
    {
        self.on_failure = Some(Box::new(f));
        self
    }

    /// Event name
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Goal state
    pub fn goal(&self) -> &S {
        &self.goal
    }
}
