//! Transition rules
//!
//! A rule answers one question: may the machine, currently in the state that
//! owns this rule, move to `goal` when driven by `event`? A state may own any
//! number of rules; a transition is allowed only if all of them agree.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

type CanTransition<S> = Arc<dyn Fn(&str, &S) -> bool + Send + Sync>;

/// Predicate governing transitions out of one state
pub struct Rule<S> {
    can_transition: CanTransition<S>,
    terminal: bool,
}

impl<S> Clone for Rule<S> {
    fn clone(&self) -> Self {
        Rule {
            can_transition: Arc::clone(&self.can_transition),
            terminal: self.terminal,
        }
    }
}

impl<S: 'static> Rule<S> {
    /// Rule backed by an arbitrary predicate over `(event, goal)`
    ///
    /// The predicate runs while the owning machine's state cell is locked.
    /// It must not read or write that machine (or anything that waits on
    /// it), or the calling thread deadlocks.
    pub fn new<F>(can_transition: F) -> Self
    where
        F: Fn(&str, &S) -> bool + Send + Sync + 'static,
    {
        Rule {
            can_transition: Arc::new(can_transition),
            terminal: false,
        }
    }

    /// Rule permitting exactly `targets`, for any event
    pub fn allow<I>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Eq + Hash + Send + Sync,
    {
        let targets: HashSet<S> = targets.into_iter().collect();
        Rule::new(move |_, goal| targets.contains(goal))
    }

    /// Rule permitting `targets` only for the named event
    pub fn on_event<I>(event: &str, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Eq + Hash + Send + Sync,
    {
        let event = event.to_owned();
        let targets: HashSet<S> = targets.into_iter().collect();
        Rule::new(move |e, goal| e == event && targets.contains(goal))
    }

    /// Rule for a final state: nothing leaves it
    pub fn terminal() -> Self {
        Rule::new(|_, _| false).into_terminal()
    }

    /// Flag this rule's owner as terminal
    pub fn into_terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    /// Check if `event` may move the owner state to `goal`
    pub fn can_transition(&self, event: &str, goal: &S) -> bool {
        (self.can_transition)(event, goal)
    }

    /// Check if the owner state is terminal
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }
}

impl<S> fmt::Debug for Rule<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("terminal", &self.terminal)
            .finish_non_exhaustive()
    }
}
