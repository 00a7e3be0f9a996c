//! Walks a circuit breaker through closed, open, half-open and back.
//! Run with: cargo run --example circuitbreaker
//! With logs: RUST_LOG=debug cargo run --example circuitbreaker

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tower::{Layer, Service, ServiceExt, service_fn};
use tower_fortify_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerLayer};
use tower_fortify_core::{ErrorKind, ResilienceError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Succeeds with true, fails with false
    let boolean_service = service_fn(|req: bool| async move {
        if req {
            Ok(req.to_string())
        } else {
            Err(ResilienceError::OperationFailed(ErrorKind::new("backend.refused")))
        }
    });

    // Opens when half of the last two calls failed, stays open one second,
    // then lets a single trial call through.
    let breaker = Arc::new(CircuitBreaker::new(
        "backendA",
        CircuitBreakerConfig::builder()
            .failure_rate_threshold(50.0)
            .sliding_window_size(2)
            .wait_duration_in_open(Duration::from_secs(1))
            .permitted_calls_in_half_open(1)
            .on_state_transition(|from, to| println!("transition: {from:?} -> {to:?}"))
            .build()?,
    ));
    let mut svc = CircuitBreakerLayer::new(Arc::clone(&breaker)).layer(boolean_service);

    println!("state: {:?}", breaker.state());

    for i in 1..=2 {
        let result = svc.ready().await.map_err(|e| e.to_string())?.call(false).await;
        println!("call {i}: {result:?}");
    }

    let rejected = svc.ready().await.map_err(|e| e.to_string())?.call(true).await;
    println!("while open: {rejected:?}");

    sleep(Duration::from_secs(1)).await;

    let trial = svc.ready().await.map_err(|e| e.to_string())?.call(true).await;
    println!("trial call: {trial:?}");
    println!("state: {:?}", breaker.state());
    println!("metrics: {:?}", breaker.metrics());

    Ok(())
}
