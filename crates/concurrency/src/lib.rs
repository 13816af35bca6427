//! Concurrency layer for strata-sync
//!
//! This crate implements the coordination primitives, each built on the one
//! before it:
//! - Waitable: condition-gated single-value cell with async waits
//! - StateMachine: rule-governed state held in a Waitable
//! - Idempotent: open-once/close-once guard driven by a lifecycle StateMachine
//! - Completable: single-result future driven by a completion StateMachine
//!
//! Every acquisition returns a `CloseGuard` released on `close()` or drop.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod completable;
pub mod guard;
pub mod idempotent;
mod listener;
pub mod rule;
pub mod state_machine;
pub mod transition;
pub mod waitable;

pub use completable::{complete_later, complete_now, Completable, OnCompletion, ON_COMPLETION};
pub use guard::CloseGuard;
pub use idempotent::{Idempotent, Openable};
pub use rule::Rule;
pub use state_machine::{StateLabel, StateMachine};
pub use transition::Transition;
pub use waitable::{Waitable, WaitableNotify};

// Re-export the shared vocabulary for convenience
pub use strata_sync_core::{
    Completion, CompletionHandle, CompletionState, Error, LifecycleState, Result, WaitConfig,
};
