//! Idempotent: run an open action once, and its close exactly once
//!
//! The single-fire guarantee comes from the lifecycle state machine, not from
//! a separate flag: only one caller can win `Openable -> Opening`, and only
//! one can win `Opened -> Closing`.
//!
//! ```text
//! open():   Openable ─► Opening ─(delegate ok)─► Opened      => close handle
//!                          └─(err/panic)─► Opened ─► Closed ─► Destroyed
//!           any other state                                  => no-op handle
//!
//! close:    Opened ─► Closing ─(release)─► Closed ─► Destroyed
//! ```
//!
//! The open action runs at most once over the object's lifetime. If it fails
//! or panics the object is retired to `Destroyed`; later opens get a no-op
//! handle.

use crate::guard::CloseGuard;
use crate::rule::Rule;
use crate::state_machine::StateMachine;
use crate::transition::Transition;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use strata_sync_core::{LifecycleState, Result};

const OPEN: &str = "open";
const OPENED: &str = "opened";
const CLOSE: &str = "close";
const CLOSED: &str = "closed";
const DESTROY: &str = "destroy";
const ABORT: &str = "abort";

/// Something that can be opened, yielding a guard that closes it
pub trait Openable: Send + Sync {
    /// Acquire the resource
    ///
    /// Anything acquired before a failure must be released before returning
    /// the error; holding partial acquisitions in `CloseGuard`s does that on
    /// drop.
    fn open(&self) -> Result<CloseGuard>;
}

struct FnOpen<F>(F);

impl<F> Openable for FnOpen<F>
where
    F: Fn() -> Result<CloseGuard> + Send + Sync,
{
    fn open(&self) -> Result<CloseGuard> {
        (self.0)()
    }
}

/// Lifecycle state machine with the built-in open/close rules
pub fn lifecycle_machine() -> StateMachine<LifecycleState> {
    let rules = LifecycleState::ALL.iter().map(|state| {
        let rule = if state.is_terminal() {
            Rule::terminal()
        } else {
            Rule::allow(state.successors().iter().copied())
        };
        (*state, vec![rule])
    });
    match StateMachine::new(LifecycleState::Openable, rules) {
        Ok(machine) => machine,
        Err(_) => unreachable!("Openable is a declared lifecycle state"),
    }
}

struct Inner {
    lifecycle: StateMachine<LifecycleState>,
    opener: Box<dyn Openable>,
    resource: Mutex<Option<CloseGuard>>,
}

impl Inner {
    fn close(&self) {
        let outcome = self.lifecycle.transition(
            Transition::new(CLOSE, LifecycleState::Closing)
                .error_state(LifecycleState::Closed)
                .on_success(|| {
                    let resource = self.resource.lock().take();
                    if let Some(resource) = resource {
                        resource.close();
                    }
                    self.lifecycle.set_state(CLOSED, LifecycleState::Closed)?;
                    self.lifecycle.set_state(DESTROY, LifecycleState::Destroyed)?;
                    Ok(true)
                })
                .on_failure(|| false),
        );
        match outcome {
            Ok(Some(true)) => tracing::debug!("idempotent closed"),
            Ok(_) => tracing::trace!(state = %self.lifecycle.state(), "close ignored"),
            Err(e) => tracing::warn!(error = %e, "idempotent close failed"),
        }
    }

    /// Walk a failed open from `Opening` to `Destroyed`, releasing anything
    /// already stored
    fn retire(&self) {
        let resource = self.resource.lock().take();
        if let Some(resource) = resource {
            resource.close();
        }
        for state in [
            LifecycleState::Opened,
            LifecycleState::Closed,
            LifecycleState::Destroyed,
        ] {
            if let Err(e) = self.lifecycle.set_state(ABORT, state) {
                tracing::warn!(error = %e, goal = %state, "idempotent retire failed");
                return;
            }
        }
        tracing::debug!("idempotent retired after failed open");
    }
}

/// Retires the lifecycle unless disarmed, covering both error returns and
/// unwinding out of the open action
struct Retire<'a> {
    inner: &'a Inner,
    armed: bool,
}

impl Drop for Retire<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.retire();
        }
    }
}

/// Guard running an open action at most once and its close exactly once
#[derive(Clone)]
pub struct Idempotent {
    inner: Arc<Inner>,
}

impl Idempotent {
    /// Guard an `Openable`
    pub fn new<O>(opener: O) -> Self
    where
        O: Openable + 'static,
    {
        Idempotent {
            inner: Arc::new(Inner {
                lifecycle: lifecycle_machine(),
                opener: Box::new(opener),
                resource: Mutex::new(None),
            }),
        }
    }

    /// Guard a closure returning the resource's close guard
    pub fn from_fn<F>(open: F) -> Self
    where
        F: Fn() -> Result<CloseGuard> + Send + Sync + 'static,
    {
        Self::new(FnOpen(open))
    }

    /// Open the resource on the first call
    ///
    /// The winner gets a handle whose release closes the resource. Every
    /// other caller gets a no-op handle. If the open action fails the error
    /// is returned and the lifecycle ends in `Destroyed`; a panic in the open
    /// action does the same while unwinding. The action is never run again.
    pub fn open(&self) -> Result<CloseGuard> {
        let inner = &self.inner;
        let handle = inner.lifecycle.transition(
            Transition::new(OPEN, LifecycleState::Opening)
                .on_success(|| {
                    let mut retire = Retire {
                        inner: inner.as_ref(),
                        armed: true,
                    };
                    let resource = inner.opener.open()?;
                    *inner.resource.lock() = Some(resource);
                    inner.lifecycle.set_state(OPENED, LifecycleState::Opened)?;
                    retire.armed = false;
                    tracing::debug!("idempotent opened");
                    let owner = Arc::clone(inner);
                    Ok(CloseGuard::new(move || owner.close()))
                })
                .on_failure(CloseGuard::noop),
        )?;
        Ok(handle.unwrap_or_else(CloseGuard::noop))
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.inner.lifecycle.state()
    }
}

impl fmt::Debug for Idempotent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Idempotent")
            .field("state", &self.state())
            .finish()
    }
}
