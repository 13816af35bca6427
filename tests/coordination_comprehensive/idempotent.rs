//! Idempotent Tests
//!
//! Open-once and close-once behaviour, failed and panicking opens, and
//! contention.

use crate::*;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use strata_sync::{CloseGuard, Idempotent, LifecycleState, Openable};

fn counting() -> (Idempotent, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let opens = Arc::new(AtomicUsize::new(0));
    let closes = Arc::new(AtomicUsize::new(0));
    let (o, c) = (Arc::clone(&opens), Arc::clone(&closes));
    let idempotent = Idempotent::from_fn(move || {
        o.fetch_add(1, Ordering::SeqCst);
        let c = Arc::clone(&c);
        Ok(CloseGuard::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    });
    (idempotent, opens, closes)
}

// =============================================================================
// OPEN / CLOSE TESTS
// =============================================================================

#[test]
fn test_open_runs_once_and_close_runs_once() {
    let (idempotent, opens, closes) = counting();

    let first = idempotent.open().unwrap();
    let second = idempotent.open().unwrap();
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert_lifecycle(idempotent.state(), LifecycleState::Opened);

    // The no-op handle does not close the resource
    second.close();
    assert_eq!(closes.load(Ordering::SeqCst), 0);

    first.close();
    first.close();
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_lifecycle(idempotent.state(), LifecycleState::Destroyed);
}

#[test]
fn test_open_after_destroy_is_noop() {
    let (idempotent, opens, _closes) = counting();
    idempotent.open().unwrap().close();

    let again = idempotent.open().unwrap();
    drop(again);
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert_lifecycle(idempotent.state(), LifecycleState::Destroyed);
}

#[test]
fn test_failed_open_is_not_retried() {
    init_tracing();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let idempotent = Idempotent::from_fn(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(boom("first attempt fails"))
        } else {
            Ok(CloseGuard::noop())
        }
    });

    let err = idempotent.open().unwrap_err();
    assert_eq!(err.to_string(), "first attempt fails");
    assert_lifecycle(idempotent.state(), LifecycleState::Destroyed);

    let again = idempotent.open().unwrap();
    assert!(again.is_closed());
    assert_lifecycle(idempotent.state(), LifecycleState::Destroyed);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[test]
fn test_panicking_open_leaves_no_stuck_opening() {
    init_tracing();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let idempotent = Idempotent::from_fn(move || -> strata_sync::CoordinationResult<CloseGuard> {
        counter.fetch_add(1, Ordering::SeqCst);
        panic!("opener panicked");
    });

    let unwound = panic::catch_unwind(AssertUnwindSafe(|| idempotent.open()));
    assert!(unwound.is_err());
    assert_lifecycle(idempotent.state(), LifecycleState::Destroyed);

    // Other threads are not left waiting on Opening
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let idempotent = idempotent.clone();
            thread::spawn(move || idempotent.open().unwrap().is_closed())
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[test]
fn test_partial_acquisition_is_released_on_failure() {
    struct TwoStep {
        released: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Openable for TwoStep {
        fn open(&self) -> strata_sync::CoordinationResult<CloseGuard> {
            let released = Arc::clone(&self.released);
            let _first = CloseGuard::new(move || released.lock().push("first"));
            Err(boom("second step failed"))
        }
    }

    let released = Arc::new(Mutex::new(Vec::new()));
    let idempotent = Idempotent::new(TwoStep {
        released: Arc::clone(&released),
    });

    assert!(idempotent.open().is_err());
    assert_eq!(*released.lock(), vec!["first"]);
    assert_lifecycle(idempotent.state(), LifecycleState::Destroyed);
}

#[test]
fn test_composite_resource_releases_in_reverse_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&order);
    let idempotent = Idempotent::from_fn(move || {
        let guards = ["db", "cache", "socket"]
            .into_iter()
            .map(|name| {
                let sink = Arc::clone(&sink);
                CloseGuard::new(move || sink.lock().push(name))
            })
            .collect();
        Ok(CloseGuard::all(guards))
    });

    drop(idempotent.open().unwrap());
    assert_eq!(*order.lock(), vec!["socket", "cache", "db"]);
}

// =============================================================================
// CONCURRENCY TESTS
// =============================================================================

#[test]
fn test_concurrent_open_has_single_winner() {
    let (idempotent, opens, closes) = counting();
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let idempotent = idempotent.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                idempotent.open().unwrap()
            })
        })
        .collect();
    let guards: Vec<CloseGuard> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert_lifecycle(idempotent.state(), LifecycleState::Opened);

    drop(guards);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_lifecycle(idempotent.state(), LifecycleState::Destroyed);
}

#[test]
fn test_concurrent_close_runs_once() {
    let (idempotent, _opens, closes) = counting();
    let guard = Arc::new(idempotent.open().unwrap());
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let guard = Arc::clone(&guard);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                guard.close();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(closes.load(Ordering::SeqCst), 1);
}
