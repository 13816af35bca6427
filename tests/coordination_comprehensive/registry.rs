//! Registry Tests
//!
//! Factories resolved through the capability map.

use crate::*;
use std::time::{Duration, Instant};
use strata_sync::{
    create_completable, create_completion, create_idempotent, create_state_machine,
    create_waitable, CloseGuard, CompletionState, Config, IdempotentFactory, Registry, Rule,
    WaitableFactory,
};
use strata_sync::registry::{IDEMPOTENT, WAITABLE};

#[test]
fn test_default_registry_creates_every_primitive() {
    let registry = default_registry();

    let cell = create_waitable(&registry, Some(1)).unwrap();
    assert_eq!(cell.get().unwrap(), 1);

    let machine = create_state_machine(&registry, "A", &["A", "B"], |s| match *s {
        "A" => vec![Rule::allow(["B"])],
        _ => vec![Rule::terminal()],
    })
    .unwrap();
    assert!(machine.set_state("go", "B").unwrap());

    let idempotent = create_idempotent(&registry, || Ok(CloseGuard::noop())).unwrap();
    let _open = idempotent.open().unwrap();

    let completable = create_completable::<i32>(&registry, None).unwrap();
    assert_eq!(completable.state(), CompletionState::Pending);

    let completion = create_completion(CompletionState::Cancelled, None::<i32>, None);
    assert!(completion.is_completed());
}

#[test]
fn test_missing_capability_is_reported() {
    let mut registry = Registry::new();
    registry.register(IDEMPOTENT, IdempotentFactory);

    let err = create_waitable::<i32>(&registry, None).unwrap_err();
    assert!(err.is_capability());
    assert!(create_idempotent(&registry, || Ok(CloseGuard::noop())).is_ok());
}

#[test]
fn test_unknown_initial_state_surfaces_as_coordination_error() {
    let registry = default_registry();
    let err = create_state_machine(&registry, "Z", &["A"], |_| vec![Rule::terminal()])
        .unwrap_err();
    assert!(err.coordination().unwrap().is_illegal_argument());
}

#[tokio::test]
async fn test_configured_default_timeout_applies() {
    let config = Config::from_toml_str(
        r#"
        [wait]
        default_timeout_ms = 10
        "#,
    )
    .unwrap();
    let registry = Registry::with_defaults(&config);

    let cell = create_waitable(&registry, Some(0)).unwrap();
    let _guard = cell.open();

    let start = Instant::now();
    let err = cell.get_when(|v| *v > 0, None).await.unwrap_err();
    assert!(err.is_timeout());
    assert!(start.elapsed() >= Duration::from_millis(10));
}

#[test]
fn test_replaced_factory_is_used() {
    let mut registry = default_registry();
    let custom = strata_sync::WaitConfig {
        default_timeout_ms: 25,
        ..Default::default()
    };
    registry.register(WAITABLE, WaitableFactory::new(custom));

    let cell = create_waitable(&registry, Some("v")).unwrap();
    assert_eq!(cell.config().default_timeout_ms, 25);
}
