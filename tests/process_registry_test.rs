//! Process-wide registry slot semantics.
//!
//! Lives in its own integration binary so the slot starts unset; the whole
//! lifecycle is walked in one test to keep the ordering deterministic.

use std::sync::Arc;

use reattempt::{ConfigError, StrategyRegistry, process_registry, set_process_registry};

#[test]
fn process_slot_is_set_once_unless_identical() {
    // Nothing installed yet.
    assert_eq!(process_registry().unwrap_err(), ConfigError::NotSet);

    let first = Arc::new(StrategyRegistry::with_defaults());
    let second = Arc::new(StrategyRegistry::with_defaults());

    set_process_registry(first.clone(), true).unwrap();
    assert!(Arc::ptr_eq(&process_registry().unwrap(), &first));

    // Re-installing the identical instance is always fine.
    set_process_registry(first.clone(), true).unwrap();

    // A different instance is rejected while the guard is on...
    assert_eq!(
        set_process_registry(second.clone(), true).unwrap_err(),
        ConfigError::AlreadySet
    );
    assert!(Arc::ptr_eq(&process_registry().unwrap(), &first));

    // ...and replaces the slot when the guard is off.
    set_process_registry(second.clone(), false).unwrap();
    assert!(Arc::ptr_eq(&process_registry().unwrap(), &second));
}
