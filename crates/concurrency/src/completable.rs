//! Completable: a single-result future with observer fan-out
//!
//! ## Design
//!
//! A completable combines:
//! - a `StateMachine<CompletionState>` that admits exactly one move out of
//!   `Pending` (first completion wins)
//! - a value `Waitable<T>` written once the terminal value exists
//! - an `Idempotent` that opens and closes both cells together
//! - an observer registry for full-`Completion` fan-out
//!
//! ## Completion sequence
//!
//! ```text
//! 1. reject unless the lifecycle is live (not Openable/Closed/Destroyed)
//! 2. claim the completion: the move must be allowed and no earlier
//!    completion may have claimed it  -- otherwise silent no-op
//! 3. publish the value into the value cell
//! 4. store the completion and snapshot observers (one lock)
//! 5. set_state("onCompletion", state)
//! 6. notify the snapshot in registration order
//! ```
//!
//! The terminal state becomes visible last, so anyone woken by it finds the
//! stored completion and the published value. An observer registering
//! concurrently either lands in the snapshot (it registered before step 4)
//! or sees the stored completion and replays it itself, never both.
//!
//! ## Observer failures
//!
//! A failing observer does not stop the fan-out. Every observer is notified;
//! the failures are returned from `on_completion` as one error (aggregated
//! when more than one failed).

use crate::guard::CloseGuard;
use crate::idempotent::Idempotent;
use crate::rule::Rule;
use crate::state_machine::StateMachine;
use crate::waitable::{Waitable, WaitableNotify};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use strata_sync_core::{
    Completion, CompletionState, Error, LifecycleState, Result, WaitConfig,
};

/// Event name driving the completion state machine
pub const ON_COMPLETION: &str = "onCompletion";

/// Sink accepting a completion
pub trait OnCompletion<T> {
    /// Deliver `completion`
    fn on_completion(&self, completion: Completion<T>) -> Result<()>;
}

type ObserverFn<T> = Box<dyn FnMut(&Completion<T>) -> Result<()> + Send>;

struct Observer<T> {
    id: u64,
    active: AtomicBool,
    callback: Mutex<ObserverFn<T>>,
}

impl<T> Observer<T> {
    fn deliver(&self, completion: &Completion<T>) -> Result<()> {
        if !self.active.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut callback = self.callback.lock();
        (*callback)(completion)
    }
}

struct Fanout<T> {
    completion: Option<Completion<T>>,
    observers: Vec<Arc<Observer<T>>>,
}

struct Inner<T> {
    state: StateMachine<CompletionState>,
    value: Waitable<T>,
    lifecycle: Idempotent,
    fanout: Mutex<Fanout<T>>,
    claimed: AtomicBool,
    next_observer: AtomicU64,
}

/// Completion state machine: `Pending` moves once to a terminal state
pub fn completion_machine(config: WaitConfig) -> StateMachine<CompletionState> {
    let rules = CompletionState::ALL.iter().map(|state| {
        let rule = if state.is_terminal() {
            Rule::terminal()
        } else {
            Rule::allow(CompletionState::TERMINAL)
        };
        (*state, vec![rule])
    });
    match StateMachine::with_config(CompletionState::Pending, rules, config) {
        Ok(machine) => machine,
        Err(_) => unreachable!("Pending is a declared completion state"),
    }
}

/// Single-result future with replayable terminal value
///
/// Cloning yields another handle to the same completable.
pub struct Completable<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Completable<T> {
    fn clone(&self) -> Self {
        Completable {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Completable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a pending completable
    pub fn new(initial: Option<T>) -> Self {
        Self::with_config(initial, WaitConfig::default())
    }

    /// Create a pending completable with an explicit timeout policy
    pub fn with_config(initial: Option<T>, config: WaitConfig) -> Self {
        let state = completion_machine(config);
        let value = Waitable::with_config(initial, config);

        let (open_state, open_value) = (state.clone(), value.clone());
        let lifecycle = Idempotent::from_fn(move || {
            let state_guard = open_state.open();
            let value_guard = open_value.open();
            Ok(CloseGuard::all(vec![state_guard, value_guard]))
        });

        Completable {
            inner: Arc::new(Inner {
                state,
                value,
                lifecycle,
                fanout: Mutex::new(Fanout {
                    completion: None,
                    observers: Vec::new(),
                }),
                claimed: AtomicBool::new(false),
                next_observer: AtomicU64::new(1),
            }),
        }
    }

    /// Open the state and value cells
    ///
    /// Safe to call repeatedly; only the first call's guard closes them.
    pub fn open(&self) -> Result<CloseGuard> {
        self.inner.lifecycle.open()
    }

    /// Lifecycle state of the open/close guard
    pub fn lifecycle_state(&self) -> LifecycleState {
        self.inner.lifecycle.state()
    }

    /// Check if a terminal completion was accepted
    pub fn is_completed(&self) -> bool {
        self.inner.state.is_terminal()
    }

    /// Current completion state
    pub fn state(&self) -> CompletionState {
        self.inner.state.state()
    }

    /// The accepted completion; `None` until terminal
    ///
    /// Stored before the state turns terminal, so it is always present once
    /// `is_completed()` is true.
    pub fn completion(&self) -> Option<Completion<T>> {
        self.inner.fanout.lock().completion.clone()
    }

    /// Subscribe to every completion, including one that already happened
    ///
    /// If a completion is already stored, `observer` runs before this
    /// returns. Should that replay fail, the observer is deregistered and the
    /// error returned. Releasing the returned guard makes the observer
    /// permanently inert.
    pub fn notify<F>(&self, observer: F) -> Result<CloseGuard>
    where
        F: FnMut(&Completion<T>) -> Result<()> + Send + 'static,
    {
        let id = self.inner.next_observer.fetch_add(1, Ordering::Relaxed);
        let observer = Arc::new(Observer {
            id,
            active: AtomicBool::new(true),
            callback: Mutex::new(Box::new(observer) as ObserverFn<T>),
        });

        let replay = {
            let mut fanout = self.inner.fanout.lock();
            match fanout.completion.clone() {
                Some(completion) => Some(completion),
                None => {
                    fanout.observers.push(Arc::clone(&observer));
                    None
                }
            }
        };

        let inner: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        let registered = Arc::clone(&observer);
        let handle = CloseGuard::new(move || {
            if registered.active.swap(false, Ordering::AcqRel) {
                if let Some(inner) = inner.upgrade() {
                    inner
                        .fanout
                        .lock()
                        .observers
                        .retain(|o| o.id != registered.id);
                }
            }
        });

        if let Some(completion) = replay {
            if let Err(e) = observer.deliver(&completion) {
                handle.close();
                return Err(e);
            }
        }
        Ok(handle)
    }

    /// Condition-gated view of the completion state
    pub fn notify_state(&self) -> WaitableNotify<CompletionState> {
        self.inner.state.notifier()
    }

    /// Condition-gated view of the terminal value
    pub fn notify_value(&self) -> WaitableNotify<T> {
        self.inner.value.notifier()
    }

    /// Number of observers still waiting for fan-out
    pub fn observer_count(&self) -> usize {
        self.inner.fanout.lock().observers.len()
    }

    fn complete(&self, completion: Completion<T>) -> Result<()> {
        let lifecycle = self.lifecycle_state();
        if matches!(
            lifecycle,
            LifecycleState::Openable | LifecycleState::Closed | LifecycleState::Destroyed
        ) {
            return Err(Error::illegal_state(format!(
                "cannot complete while lifecycle is {}",
                lifecycle
            )));
        }

        let target = completion.state();
        let allowed = self.inner.state.is_transition_allowed(ON_COMPLETION, &target);
        if !allowed || self.inner.claimed.swap(true, Ordering::AcqRel) {
            tracing::debug!(
                state = %self.state(),
                rejected = %target,
                "completion ignored"
            );
            return Ok(());
        }

        if let Some(value) = completion.value() {
            self.inner.value.accept(value.clone());
        }

        let observers = {
            let mut fanout = self.inner.fanout.lock();
            fanout.completion = Some(completion.clone());
            std::mem::take(&mut fanout.observers)
        };
        if !self.inner.state.set_state(ON_COMPLETION, target)? {
            tracing::warn!(
                state = %self.state(),
                goal = %target,
                "claimed completion not applied"
            );
        }
        tracing::debug!(
            state = %completion.state(),
            observers = observers.len(),
            "completable completed"
        );

        let mut failures = Vec::new();
        for observer in &observers {
            if let Err(e) = observer.deliver(&completion) {
                tracing::warn!(observer = observer.id, error = %e, "observer failed");
                failures.push(e);
            }
        }
        match Error::aggregate(failures) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<T> OnCompletion<T> for Completable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Deliver the producer's completion; the first terminal one wins
    ///
    /// Fails with `IllegalState` when never opened or already closed.
    fn on_completion(&self, completion: Completion<T>) -> Result<()> {
        self.complete(completion)
    }
}

impl<T: fmt::Debug> fmt::Debug for Completable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completable")
            .field("state", &self.state())
            .field("lifecycle", &self.lifecycle_state())
            .field("completion", &self.completion())
            .finish()
    }
}

/// Run `f` now and deliver its outcome to `sink`
///
/// The completion is delivered exactly once: `Succeeded` with the value,
/// `Failed` with the error, or `Failed` if `f` panics (from the unwinding
/// drop). The outcome of `f` is returned; a delivery failure is merged in.
pub fn complete_now<T, S, F>(sink: &S, f: F) -> Result<T>
where
    T: Clone,
    S: OnCompletion<T> + ?Sized,
    F: FnOnce() -> Result<T>,
{
    struct Delivery<'s, T, S: OnCompletion<T> + ?Sized> {
        sink: &'s S,
        armed: bool,
        _value: std::marker::PhantomData<fn() -> T>,
    }

    impl<T, S: OnCompletion<T> + ?Sized> Drop for Delivery<'_, T, S> {
        fn drop(&mut self) {
            if self.armed {
                let failed = Completion::failed(Error::message("completion body panicked"));
                let _ = self.sink.on_completion(failed);
            }
        }
    }

    let mut delivery = Delivery {
        sink,
        armed: true,
        _value: std::marker::PhantomData,
    };
    let outcome = f();
    delivery.armed = false;

    let completion = match &outcome {
        Ok(value) => Completion::succeeded(value.clone()),
        Err(e) => Completion::failed(e.clone()),
    };
    let delivered = sink.on_completion(completion);

    match (outcome, delivered) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(d)) => Err(d),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(d)) => Err(Error::Aggregate(vec![e, d])),
    }
}

/// Hand `sink` to `delegate`, which completes it later
///
/// If `delegate` fails before returning, ownership was never transferred:
/// `sink` receives a `Failed` completion carrying the error, and the error is
/// returned. On success nothing is delivered here.
pub fn complete_later<T, S, F>(sink: S, delegate: F) -> Result<()>
where
    S: OnCompletion<T> + Clone,
    F: FnOnce(S) -> Result<()>,
{
    let fallback = sink.clone();
    match delegate(sink) {
        Ok(()) => Ok(()),
        Err(e) => {
            if let Err(d) = fallback.on_completion(Completion::failed(e.clone())) {
                tracing::warn!(error = %d, "failed to deliver handoff failure");
                return Err(Error::Aggregate(vec![e, d]));
            }
            Err(e)
        }
    }
}
