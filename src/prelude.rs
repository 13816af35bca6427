//! Convenient imports for strata-sync.
//!
//! ```ignore
//! use strata_sync::prelude::*;
//!
//! let registry = Registry::with_defaults(&Config::default());
//! let cell = create_waitable(&registry, Some(1))?;
//! ```

// Entry points
pub use crate::config::Config;
pub use crate::registry::{
    create_completable, create_completion, create_idempotent, create_state_machine,
    create_waitable, Registry,
};

// Error handling
pub use crate::error::{Error, Result};

// Primitives
pub use crate::{
    complete_later, complete_now, CloseGuard, Completable, Idempotent, OnCompletion, Openable,
    Rule, StateMachine, Transition, Waitable, WaitableNotify,
};

// Core types
pub use crate::{Completion, CompletionState, LifecycleState, WaitConfig};
