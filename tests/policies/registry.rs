use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower_fortify::PolicyRegistry;
use tower_fortify_bulkhead::{Bulkhead, BulkheadConfig};
use tower_fortify_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use tower_fortify_core::Registry;

fn window_of(size: usize) -> CircuitBreakerConfig {
    CircuitBreakerConfig::builder()
        .sliding_window_size(size)
        .build()
        .unwrap()
}

#[test]
fn get_or_create_returns_the_same_instance() {
    let registry: Registry<CircuitBreaker> = Registry::new(window_of(10));

    let first = registry.get_or_create_with("backendA", window_of(2));
    let second = registry.get_or_create_with("backendA", window_of(50));

    assert!(Arc::ptr_eq(&first, &second));
    // The second config is ignored.
    assert_eq!(second.config().sliding_window_size(), 2);
    assert_eq!(registry.len(), 1);
}

#[test]
fn replace_swaps_the_stored_instance() {
    let registry: Registry<CircuitBreaker> = Registry::new(window_of(10));
    let original = registry.get_or_create("backendA");
    original.transition_to_forced_open();

    let previous = registry.replace("backendA", window_of(4)).unwrap();
    assert!(Arc::ptr_eq(&previous, &original));

    let current = registry.find("backendA").unwrap();
    assert!(!Arc::ptr_eq(&current, &original));
    assert_eq!(current.state(), CircuitState::Closed);
    assert_eq!(current.config().sliding_window_size(), 4);
}

#[test]
fn registry_events_report_changes() {
    let added = Arc::new(AtomicUsize::new(0));
    let removed = Arc::new(AtomicUsize::new(0));
    let a = Arc::clone(&added);
    let r = Arc::clone(&removed);
    let registry: Registry<Bulkhead> = Registry::new(BulkheadConfig::default())
        .on_entry_added(move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        })
        .on_entry_removed(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        });

    registry.get_or_create("a");
    registry.get_or_create("a");
    registry.get_or_create("b");
    assert!(registry.remove("a").is_some());
    assert!(registry.remove("a").is_none());

    assert_eq!(added.load(Ordering::SeqCst), 2);
    assert_eq!(removed.load(Ordering::SeqCst), 1);
    assert_eq!(registry.names(), vec!["b".to_string()]);
}

#[tokio::test]
async fn concurrent_lookups_create_one_instance() {
    let registry = Arc::new(PolicyRegistry::new());
    let mut handles = Vec::new();
    for _ in 0..16 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move { registry.bulkhead("shared") }));
    }

    let first = registry.bulkhead("shared");
    for handle in handles {
        assert!(Arc::ptr_eq(&handle.await.unwrap(), &first));
    }
    assert_eq!(registry.bulkheads().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn policies_from_the_registry_share_accounting() {
    let registry = PolicyRegistry::new().with_circuit_breaker_defaults(window_of(2));

    let seen_by_a = registry.circuit_breaker("backendA");
    for _ in 0..2 {
        let permit = seen_by_a.try_acquire_permission().unwrap();
        seen_by_a.on_error(permit, Duration::ZERO, tower_fortify_core::ErrorKind::new("io"));
    }

    let seen_by_b = registry.circuit_breaker("backendA");
    assert_eq!(seen_by_b.state(), CircuitState::Open);
    assert_eq!(registry.circuit_breaker("backendB").state(), CircuitState::Closed);
}
