//! StateMachine Tests
//!
//! Rule-checked transitions, transition descriptors and state waits.

use crate::*;
use parking_lot::Mutex;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use strata_sync::{Rule, StateMachine, Transition};

// =============================================================================
// SET STATE TESTS
// =============================================================================

#[test]
fn test_disallowed_then_allowed_transition() {
    let machine = abc_machine();

    assert!(!machine.set_state("go", "C").unwrap());
    assert_eq!(machine.state(), "A");

    assert!(machine.set_state("go", "B").unwrap());
    assert_eq!(machine.state(), "B");
}

#[test]
fn test_unknown_goal_is_illegal_argument() {
    let machine = abc_machine();
    let err = machine.set_state("go", "Z").unwrap_err();
    assert!(err.is_illegal_argument());
    assert_eq!(machine.state(), "A");
}

#[test]
fn test_unknown_initial_state_is_rejected() {
    let result = StateMachine::new("Z", vec![("A", vec![Rule::terminal()])]);
    assert!(result.unwrap_err().is_illegal_argument());
}

#[test]
fn test_terminal_state_rejects_everything() {
    let machine = abc_machine();
    machine.set_state("go", "B").unwrap();
    machine.set_state("go", "C").unwrap();

    assert!(machine.is_terminal());
    for goal in ["A", "B", "C"] {
        assert!(!machine.set_state("go", goal).unwrap());
    }
}

#[test]
fn test_all_rules_must_agree() {
    let machine = StateMachine::new(
        1u8,
        vec![
            (
                1,
                vec![Rule::allow([2, 3]), Rule::new(|event: &str, _: &u8| event == "next")],
            ),
            (2, vec![Rule::terminal()]),
            (3, vec![Rule::terminal()]),
        ],
    )
    .unwrap();

    assert!(!machine.is_transition_allowed("skip", &2));
    assert!(machine.is_transition_allowed("next", &3));
    assert!(!machine.set_state("skip", 2).unwrap());
    assert!(machine.set_state("next", 2).unwrap());
}

#[test]
fn test_event_scoped_rule() {
    let machine = StateMachine::new(
        "idle",
        vec![
            ("idle", vec![Rule::on_event("start", ["running"])]),
            ("running", vec![Rule::on_event("stop", ["idle"])]),
        ],
    )
    .unwrap();

    assert!(!machine.set_state("stop", "running").unwrap());
    assert!(machine.set_state("start", "running").unwrap());
    assert!(machine.set_state("stop", "idle").unwrap());
}

#[test]
fn test_concurrent_set_state_has_single_winner() {
    let machine = abc_machine();
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let machine = machine.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                machine.set_state("go", "B").unwrap()
            })
        })
        .collect();
    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|moved| *moved)
        .count();

    assert_eq!(winners, 1);
    assert_eq!(machine.state(), "B");
}

// =============================================================================
// TRANSITION DESCRIPTOR TESTS
// =============================================================================

#[test]
fn test_transition_success_runs_producer_after_move() {
    let machine = abc_machine();
    let observed = Mutex::new(None);

    let value = machine
        .transition(Transition::new("go", "B").on_success(|| {
            *observed.lock() = Some(machine.state());
            Ok(10)
        }))
        .unwrap();

    assert_eq!(value, Some(10));
    assert_eq!(*observed.lock(), Some("B"));
}

#[test]
fn test_transition_error_moves_to_error_state() {
    let machine = abc_machine();

    let value = machine
        .transition(
            Transition::new("go", "B")
                .error_state("A")
                .on_success(|| Err(boom("action failed")))
                .on_error(|e| e.to_string()),
        )
        .unwrap();

    assert_eq!(value.as_deref(), Some("action failed"));
    assert_eq!(machine.state(), "A");
}

#[test]
fn test_transition_error_without_handler_propagates() {
    let machine = abc_machine();
    let err = machine
        .transition(Transition::<_, ()>::new("go", "B").on_success(|| Err(boom("nope"))))
        .unwrap_err();
    assert_eq!(err.to_string(), "nope");
    assert_eq!(machine.state(), "B");
}

#[test]
fn test_transition_failure_uses_fallback() {
    let machine = abc_machine();
    let value = machine
        .transition(Transition::new("go", "C").on_failure(|| "rejected"))
        .unwrap();
    assert_eq!(value, Some("rejected"));
    assert_eq!(machine.state(), "A");
}

#[test]
fn test_transition_failure_without_fallback_is_rejected() {
    let machine = abc_machine();
    let err = machine
        .transition(Transition::<_, ()>::new("go", "C"))
        .unwrap_err();
    assert!(err.is_transition_rejected());
}

#[test]
fn test_transition_failure_moves_to_failure_state() {
    let machine = abc_machine();
    machine.set_state("go", "B").unwrap();
    machine.set_state("go", "A").unwrap();

    // A cannot reach C; the failure state B is reachable
    let value = machine
        .transition(
            Transition::new("go", "C")
                .failure_state("B")
                .on_failure(|| false),
        )
        .unwrap();
    assert_eq!(value, Some(false));
    assert_eq!(machine.state(), "B");
}

// =============================================================================
// WAIT TESTS
// =============================================================================

#[tokio::test]
async fn test_get_when_waits_for_state() {
    let machine = abc_machine();
    let _guard = machine.open();

    let driver = machine.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        driver.set_state("go", "B").unwrap();
        driver.set_state("go", "C").unwrap();
    });

    let state = machine
        .get_when(|s| *s == "C", Some(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(state, "C");
}

#[test]
fn test_notify_while_tracks_transitions() {
    let machine = abc_machine();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let _listener = machine.notify_while(|_| true, move |s| sink.lock().push(*s));

    machine.set_state("go", "C").unwrap();
    machine.set_state("go", "B").unwrap();
    machine.set_state("go", "A").unwrap();

    assert_eq!(*seen.lock(), vec!["A", "B", "A"]);
}
