//! StateMachine: a rule-governed, observable state holder
//!
//! The current state lives in a `Waitable<S>`, so every waiting and
//! subscription operation of the cell is available on the machine. The rule
//! table is built once at construction and never changes, so it is shared
//! without locking.
//!
//! ## Transition check
//!
//! ```text
//! unknown goal           -> not allowed (set_state: IllegalArgument)
//! goal == current        -> not allowed (no-op, never notifies)
//! current has no rules   -> allowed
//! otherwise              -> every rule of current must allow (event, goal)
//! ```
//!
//! `set_state` performs the check and the write under the cell lock, so of
//! any number of racing callers targeting the same state exactly one wins.
//! Rule predicates therefore must not call back into the same machine.

use crate::guard::CloseGuard;
use crate::rule::Rule;
use crate::transition::Transition;
use crate::waitable::{Waitable, WaitableNotify};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use strata_sync_core::{Error, Result, WaitConfig};

/// Bounds every state label satisfies
pub trait StateLabel: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<S> StateLabel for S where S: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// Guarded, observable state container
pub struct StateMachine<S> {
    state: Waitable<S>,
    rules: Arc<HashMap<S, Vec<Rule<S>>>>,
}

impl<S> Clone for StateMachine<S> {
    fn clone(&self) -> Self {
        StateMachine {
            state: self.state.clone(),
            rules: Arc::clone(&self.rules),
        }
    }
}

fn can_move<S: StateLabel>(
    rules: &HashMap<S, Vec<Rule<S>>>,
    current: &S,
    event: &str,
    goal: &S,
) -> bool {
    if current == goal || !rules.contains_key(goal) {
        return false;
    }
    match rules.get(current) {
        Some(owned) => owned.iter().all(|rule| rule.can_transition(event, goal)),
        None => false,
    }
}

impl<S: StateLabel> StateMachine<S> {
    /// Create a machine from `(state, rules)` pairs
    ///
    /// Every state the machine may ever hold must appear in `rules`,
    /// including `initial`.
    pub fn new<I>(initial: S, rules: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<Rule<S>>)>,
    {
        Self::with_config(initial, rules, WaitConfig::default())
    }

    /// Create a machine with an explicit timeout policy for its waits
    pub fn with_config<I>(initial: S, rules: I, config: WaitConfig) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<Rule<S>>)>,
    {
        let rules: HashMap<S, Vec<Rule<S>>> = rules.into_iter().collect();
        if !rules.contains_key(&initial) {
            return Err(Error::illegal_argument(format!(
                "initial state {:?} is not a declared state",
                initial
            )));
        }
        Ok(StateMachine {
            state: Waitable::with_config(Some(initial), config),
            rules: Arc::new(rules),
        })
    }

    /// Create a machine from a state list and a rule lookup
    pub fn from_rules_of<F>(initial: S, states: &[S], rules_of: F) -> Result<Self>
    where
        F: Fn(&S) -> Vec<Rule<S>>,
    {
        Self::new(
            initial,
            states.iter().map(|s| (s.clone(), rules_of(s))),
        )
    }

    /// Current state
    pub fn state(&self) -> S {
        // The cell is created with a value and only ever replaced
        match self.state.get() {
            Ok(state) => state,
            Err(_) => unreachable!("state machine cell is never empty"),
        }
    }

    /// Check if `state` was declared
    pub fn has_state(&self, state: &S) -> bool {
        self.rules.contains_key(state)
    }

    /// Declared states, in no particular order
    pub fn states(&self) -> Vec<S> {
        self.rules.keys().cloned().collect()
    }

    /// Check if `event` may move the machine from its current state to `goal`
    pub fn is_transition_allowed(&self, event: &str, goal: &S) -> bool {
        can_move(&self.rules, &self.state(), event, goal)
    }

    /// Check if the current state owns a terminal rule
    pub fn is_terminal(&self) -> bool {
        self.rules
            .get(&self.state())
            .map(|owned| owned.iter().any(Rule::is_terminal))
            .unwrap_or(false)
    }

    /// Move to `goal` if allowed; returns whether the move happened
    ///
    /// Fails with `IllegalArgument` when `goal` is not a declared state.
    /// Rule predicates are evaluated under the state cell lock.
    pub fn set_state(&self, event: &str, goal: S) -> Result<bool> {
        if !self.has_state(&goal) {
            return Err(Error::illegal_argument(format!(
                "unknown state {:?}",
                goal
            )));
        }
        let rules = &self.rules;
        let mut from = None;
        let moved = self
            .state
            .accept_if_with(
                |current| {
                    from = Some(current.clone());
                    can_move(rules, current, event, &goal)
                },
                |_| goal.clone(),
            )
            .is_some();
        if moved {
            tracing::trace!(event, from = ?from, to = ?goal, "state transition");
        }
        Ok(moved)
    }

    /// Execute a transition descriptor
    ///
    /// Returns the value produced for the outcome that occurred, or `None`
    /// when no producer was given for it.
    pub fn transition<R>(&self, transition: Transition<'_, S, R>) -> Result<Option<R>> {
        let Transition {
            event,
            goal,
            error_state,
            failure_state,
            on_success,
            on_error,
            on_failure,
        } = transition;

        if self.set_state(&event, goal.clone())? {
            let produced = match on_success {
                Some(produce) => produce(),
                None => return Ok(None),
            };
            return match produced {
                Ok(value) => Ok(Some(value)),
                Err(err) => {
                    tracing::debug!(event = %event, error = %err, "transition action failed");
                    if let Some(state) = error_state {
                        self.set_state(&event, state)?;
                    }
                    match on_error {
                        Some(recover) => Ok(Some(recover(err))),
                        None => Err(err),
                    }
                }
            };
        }

        let from = self.state();
        if let Some(state) = failure_state {
            self.set_state(&event, state)?;
        }
        match on_failure {
            Some(fallback) => Ok(Some(fallback())),
            None => Err(Error::transition_rejected(event, from, goal)),
        }
    }

    /// Activate waiting on the state cell
    pub fn open(&self) -> CloseGuard {
        self.state.open()
    }

    /// Permanently close the state cell
    pub fn shutdown(&self) {
        self.state.shutdown()
    }

    /// Current state; see [`Waitable::get`]
    pub fn get(&self) -> Result<S> {
        self.state.get()
    }

    /// Current state if `predicate` holds
    pub fn get_if<P>(&self, predicate: P) -> Option<S>
    where
        P: FnOnce(&S) -> bool,
    {
        self.state.get_if(predicate)
    }

    /// Wait for a state satisfying `predicate`
    pub async fn get_when<P>(&self, predicate: P, timeout: Option<Duration>) -> Result<S>
    where
        P: Fn(&S) -> bool + Send + Sync + 'static,
    {
        self.state.get_when(predicate, timeout).await
    }

    /// Subscribe to state changes satisfying `predicate`
    pub fn notify_while<P, L>(&self, predicate: P, listener: L) -> CloseGuard
    where
        P: Fn(&S) -> bool + Send + Sync + 'static,
        L: FnMut(&S) + Send + 'static,
    {
        self.state.notify_while(predicate, listener)
    }

    /// Read and subscribe-only view of the state cell
    pub fn notifier(&self) -> WaitableNotify<S> {
        self.state.notifier()
    }
}

impl<S: StateLabel> fmt::Debug for StateMachine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("state", &self.state.get().ok())
            .field("states", &self.rules.len())
            .finish()
    }
}
