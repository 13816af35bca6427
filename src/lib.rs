//! # strata-sync
//!
//! Coordination primitives for concurrent code: condition-gated value cells,
//! rule-governed state machines, idempotent open/close guards and single-result
//! completables.
//!
//! ## Quick Start
//!
//! ```ignore
//! use strata_sync::prelude::*;
//!
//! let registry = Registry::with_defaults(&Config::default());
//!
//! // A value cell that wakes waiters when a predicate becomes true
//! let cell = create_waitable(&registry, Some(0))?;
//! let _open = cell.open();
//! cell.accept(42);
//! let v = cell.get_when(|v| *v > 10, None).await?;
//!
//! // A single-result future with observer fan-out
//! let completable = create_completable::<String>(&registry, None)?;
//! let _live = completable.open()?;
//! let _observer = completable.notify(|c| {
//!     println!("completed: {}", c.state());
//!     Ok(())
//! })?;
//! complete_now(&completable, || Ok("done".to_string()))?;
//! ```
//!
//! ## Primitives
//!
//! - [`Waitable`] - single-value cell with predicate waits and listeners
//! - [`StateMachine`] - rule-governed state held in a waitable
//! - [`Idempotent`] - open-once/close-once resource guard
//! - [`Completable`] - first-completion-wins future with replay
//!
//! Every acquisition hands back a [`CloseGuard`] that releases on `close()`
//! or drop.

#![warn(missing_docs)]

mod config;
mod error;
pub mod registry;

pub mod prelude;

// Re-export main entry points
pub use config::Config;
pub use error::{Error, Result};
pub use registry::{
    create_completable, create_completion, create_idempotent, create_state_machine,
    create_waitable, CompletableFactory, IdempotentFactory, Registry, StateMachineFactory,
    WaitableFactory,
};

// Re-export primitives
pub use strata_sync_concurrency::{
    complete_later, complete_now, CloseGuard, Completable, Idempotent, OnCompletion, Openable,
    Rule, StateLabel, StateMachine, Transition, Waitable, WaitableNotify, ON_COMPLETION,
};

// Re-export shared vocabulary
pub use strata_sync_core::{
    Completion, CompletionHandle, CompletionState, LifecycleState, WaitConfig, MAX_TIMEOUT_MS,
};

/// Coordination error type shared by the primitives
pub use strata_sync_core::Error as CoordinationError;
/// Result type returned by the primitives
pub use strata_sync_core::Result as CoordinationResult;
