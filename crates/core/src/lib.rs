//! Core types for strata-sync
//!
//! This crate defines the vocabulary shared by every coordination primitive:
//! - Error: the coordination error taxonomy
//! - Completion / CompletionState: outcome records carried by completables
//! - LifecycleState: open/close labels used by idempotent guards
//! - WaitConfig: timeout policy for asynchronous waits

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod completion;
pub mod config;
pub mod error;
pub mod lifecycle;

pub use completion::{Completion, CompletionHandle, CompletionState};
pub use config::{WaitConfig, MAX_TIMEOUT_MS};
pub use error::{Error, Result};
pub use lifecycle::LifecycleState;
