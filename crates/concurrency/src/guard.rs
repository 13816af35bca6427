//! Scoped release handles
//!
//! Every acquisition in this crate (opening a cell, subscribing a listener,
//! registering an observer) returns a `CloseGuard`. The release action runs
//! exactly once: on the first `close()` or when the guard is dropped,
//! whichever comes first.

use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

type ReleaseFn = Box<dyn FnOnce() + Send>;
type ReleaseSlot = Mutex<Option<ReleaseFn>>;

/// Handle whose release action runs at most once
#[must_use = "dropping a CloseGuard releases what it guards"]
pub struct CloseGuard {
    release: Arc<ReleaseSlot>,
}

/// Weak reference to a guard's release action
///
/// Lets the owner of a subscription release it from its side, so the
/// subscriber's guard reports `is_closed()`.
pub(crate) struct GuardSlot {
    release: Weak<ReleaseSlot>,
}

impl GuardSlot {
    /// Run the guard's release action if it has not run yet
    pub(crate) fn release(&self) {
        if let Some(slot) = self.release.upgrade() {
            let release = slot.lock().take();
            if let Some(release) = release {
                release();
            }
        }
    }
}

impl CloseGuard {
    /// Guard that runs `release` when closed
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        CloseGuard {
            release: Arc::new(Mutex::new(Some(Box::new(release)))),
        }
    }

    /// Guard with nothing to release
    pub fn noop() -> Self {
        CloseGuard {
            release: Arc::new(Mutex::new(None)),
        }
    }

    /// Combine guards into one that releases them in reverse order
    pub fn all(guards: Vec<CloseGuard>) -> Self {
        CloseGuard::new(move || {
            for guard in guards.into_iter().rev() {
                guard.close();
            }
        })
    }

    /// Run the release action if it has not run yet
    pub fn close(&self) {
        // Take under the lock, run outside it: a release action may drop
        // other guards or re-enter whatever this guard protects.
        let release = self.release.lock().take();
        if let Some(release) = release {
            release();
        }
    }

    /// Check if the release action already ran (or never existed)
    pub fn is_closed(&self) -> bool {
        self.release.lock().is_none()
    }

    pub(crate) fn slot(&self) -> GuardSlot {
        GuardSlot {
            release: Arc::downgrade(&self.release),
        }
    }
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for CloseGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseGuard")
            .field("closed", &self.is_closed())
            .finish()
    }
}
