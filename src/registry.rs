//! Capability registry and primitive factories.
//!
//! A `Registry` is an explicit capability map handed to every `create_*`
//! function; there is no process-wide singleton. Each capability is a factory
//! stored under a well-known name and resolved by type:
//!
//! | Name | Factory |
//! |------|---------|
//! | `waitable` | [`WaitableFactory`] |
//! | `state-machine` | [`StateMachineFactory`] |
//! | `idempotent` | [`IdempotentFactory`] |
//! | `completable` | [`CompletableFactory`] |
//!
//! Callers may replace any entry, e.g. to give one subsystem a different
//! timeout policy.

use crate::config::Config;
use crate::error::{Error, Result};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use strata_sync_concurrency::{
    CloseGuard, Completable, Completion, CompletionState, Idempotent, Openable, Rule, StateLabel,
    StateMachine, Waitable,
};
use strata_sync_core::WaitConfig;

/// Registry name of the waitable factory
pub const WAITABLE: &str = "waitable";
/// Registry name of the state machine factory
pub const STATE_MACHINE: &str = "state-machine";
/// Registry name of the idempotent factory
pub const IDEMPOTENT: &str = "idempotent";
/// Registry name of the completable factory
pub const COMPLETABLE: &str = "completable";

type Capability = Arc<dyn Any + Send + Sync>;

/// Named capability map
#[derive(Clone, Default)]
pub struct Registry {
    entries: HashMap<String, Capability>,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the four built-in factories configured from `config`
    pub fn with_defaults(config: &Config) -> Self {
        let wait = config.wait;
        let mut registry = Registry::new();
        registry.register(WAITABLE, WaitableFactory::new(wait));
        registry.register(STATE_MACHINE, StateMachineFactory::new(wait));
        registry.register(IDEMPOTENT, IdempotentFactory);
        registry.register(COMPLETABLE, CompletableFactory::new(wait));
        registry
    }

    /// Register `capability` under `name`, replacing any previous entry
    ///
    /// Returns `true` if an entry was replaced.
    pub fn register<C>(&mut self, name: impl Into<String>, capability: C) -> bool
    where
        C: Any + Send + Sync,
    {
        let name = name.into();
        tracing::debug!(capability = %name, "registering capability");
        self.entries.insert(name, Arc::new(capability)).is_some()
    }

    /// Check if `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Resolve the capability `name` as a `C`
    pub fn resolve<C>(&self, name: &str) -> Result<Arc<C>>
    where
        C: Any + Send + Sync,
    {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| Error::Capability(format!("no capability named '{}'", name)))?;
        Arc::clone(entry).downcast::<C>().map_err(|_| {
            Error::Capability(format!(
                "capability '{}' is not a {}",
                name,
                std::any::type_name::<C>()
            ))
        })
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("Registry").field("capabilities", &names).finish()
    }
}

/// Creates waitables with a fixed timeout policy
#[derive(Debug, Clone, Copy, Default)]
pub struct WaitableFactory {
    wait: WaitConfig,
}

impl WaitableFactory {
    /// Factory applying `wait` to every waitable it creates
    pub fn new(wait: WaitConfig) -> Self {
        WaitableFactory { wait }
    }

    /// Create a waitable holding an optional initial value
    pub fn create<T>(&self, initial: Option<T>) -> Waitable<T>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        Waitable::with_config(initial, self.wait)
    }
}

/// Creates state machines with a fixed timeout policy
#[derive(Debug, Clone, Copy, Default)]
pub struct StateMachineFactory {
    wait: WaitConfig,
}

impl StateMachineFactory {
    /// Factory applying `wait` to every machine it creates
    pub fn new(wait: WaitConfig) -> Self {
        StateMachineFactory { wait }
    }

    /// Create a machine over `states`, looking up each state's rules
    pub fn create<S, F>(&self, initial: S, states: &[S], rules_of: F) -> Result<StateMachine<S>>
    where
        S: StateLabel,
        F: Fn(&S) -> Vec<Rule<S>>,
    {
        let rules = states.iter().map(|s| (s.clone(), rules_of(s)));
        Ok(StateMachine::with_config(initial, rules, self.wait)?)
    }
}

/// Creates idempotent guards
#[derive(Debug, Clone, Copy, Default)]
pub struct IdempotentFactory;

impl IdempotentFactory {
    /// Guard an `Openable`
    pub fn create<O>(&self, opener: O) -> Idempotent
    where
        O: Openable + 'static,
    {
        Idempotent::new(opener)
    }

    /// Guard a closure returning the resource's close guard
    pub fn create_fn<F>(&self, open: F) -> Idempotent
    where
        F: Fn() -> strata_sync_core::Result<CloseGuard> + Send + Sync + 'static,
    {
        Idempotent::from_fn(open)
    }
}

/// Creates completables with a fixed timeout policy
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletableFactory {
    wait: WaitConfig,
}

impl CompletableFactory {
    /// Factory applying `wait` to every completable it creates
    pub fn new(wait: WaitConfig) -> Self {
        CompletableFactory { wait }
    }

    /// Create a pending completable
    pub fn create<T>(&self, initial: Option<T>) -> Completable<T>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        Completable::with_config(initial, self.wait)
    }
}

/// Create a waitable through the registry's waitable factory
pub fn create_waitable<T>(registry: &Registry, initial: Option<T>) -> Result<Waitable<T>>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    Ok(registry
        .resolve::<WaitableFactory>(WAITABLE)?
        .create(initial))
}

/// Create a state machine through the registry's state machine factory
pub fn create_state_machine<S, F>(
    registry: &Registry,
    initial: S,
    states: &[S],
    rules_of: F,
) -> Result<StateMachine<S>>
where
    S: StateLabel,
    F: Fn(&S) -> Vec<Rule<S>>,
{
    registry
        .resolve::<StateMachineFactory>(STATE_MACHINE)?
        .create(initial, states, rules_of)
}

/// Create an idempotent guard through the registry's idempotent factory
pub fn create_idempotent<F>(registry: &Registry, open: F) -> Result<Idempotent>
where
    F: Fn() -> strata_sync_core::Result<CloseGuard> + Send + Sync + 'static,
{
    Ok(registry
        .resolve::<IdempotentFactory>(IDEMPOTENT)?
        .create_fn(open))
}

/// Create a completable through the registry's completable factory
pub fn create_completable<T>(registry: &Registry, initial: Option<T>) -> Result<Completable<T>>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    Ok(registry
        .resolve::<CompletableFactory>(COMPLETABLE)?
        .create(initial))
}

/// Create a completion record
pub fn create_completion<T>(
    state: CompletionState,
    value: Option<T>,
    thrown: Option<strata_sync_core::Error>,
) -> Completion<T> {
    Completion::new(state, value, thrown)
}
