//! Coordination Primitives Comprehensive Test Suite
//!
//! Exercises the public surface of strata-sync end to end: waitables,
//! state machines, idempotent guards, completables and the registry that
//! creates them.
//!
//! ## Key Verification Points
//!
//! 1. Waits resolve on the first satisfying value and fail on timeout or close
//! 2. Listeners see every distinct value exactly once, in mutation order
//! 3. State transitions are atomic and rule-checked
//! 4. Open and close actions run at most once under contention
//! 5. The first completion wins and is replayed to late observers
//!
//! ## Running Tests
//!
//! ```bash
//! # Run the whole suite
//! cargo test --test coordination_comprehensive
//!
//! # Run completable tests only
//! cargo test --test coordination_comprehensive completable::
//! ```

use strata_sync::{
    Config, CoordinationError, LifecycleState, Registry, Rule, StateMachine, Waitable,
};

pub mod idempotent;
pub mod registry;
pub mod state_machine;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Route `tracing` output through the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Registry with the default factories
pub fn default_registry() -> Registry {
    Registry::with_defaults(&Config::default())
}

/// Opened waitable; keep the returned guard alive for the test's duration
pub fn opened_waitable<T>(initial: Option<T>) -> (Waitable<T>, strata_sync::CloseGuard)
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let cell = Waitable::new(initial);
    let guard = cell.open();
    (cell, guard)
}

/// Machine over `A`, `B`, `C` where `A` may only move to `B`
pub fn abc_machine() -> StateMachine<&'static str> {
    StateMachine::from_rules_of("A", &["A", "B", "C"], |state| match *state {
        "A" => vec![Rule::allow(["B"])],
        "B" => vec![Rule::allow(["A", "C"])],
        _ => vec![Rule::terminal()],
    })
    .unwrap()
}

/// Error used by failing delegates
pub fn boom(msg: &str) -> CoordinationError {
    CoordinationError::message(msg)
}

/// Assert a lifecycle state with a readable message
pub fn assert_lifecycle(actual: LifecycleState, expected: LifecycleState) {
    assert_eq!(
        actual, expected,
        "expected lifecycle {}, found {}",
        expected, actual
    );
}
