use rampart_pipeline::{
    BreakerConfig, BreakerState, BulkheadConfig, FallbackStrategy, GuardError, Resilience,
    RetryRule,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A dependency that never recovers: every pipeline invocation is answered
/// by the fallback, the breaker opens once the volume threshold is met, and
/// after that the operation is no longer invoked at all. No bulkhead slot
/// leaks along the way.
#[tokio::test]
async fn full_protection_around_a_dead_dependency() {
    init_tracing();

    let resilience = Resilience::new();
    resilience.configure_circuit_breaker(
        "orders",
        BreakerConfig::builder()
            .failure_ratio(1.0)
            .request_volume_threshold(5)
            .open_duration(Duration::from_secs(60))
            .build(),
    );
    resilience.configure_retry(
        "orders",
        RetryRule::builder()
            .max_retries(0)
            .delay(Duration::from_millis(1))
            .build(),
    );
    resilience.configure_bulkhead(
        "orders",
        BulkheadConfig::builder()
            .max_concurrent_calls(2)
            .waiting_queue_capacity(10)
            .wait_timeout(Duration::from_secs(1))
            .build(),
    );
    resilience.register_fallback::<u32, String>("orders", FallbackStrategy::Value(7));

    let calls = Arc::new(AtomicUsize::new(0));
    for _ in 0..5 {
        let c = Arc::clone(&calls);
        let result: Result<u32, GuardError<String>> = resilience
            .protect("orders", move || {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("connection refused".to_string())
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(
        resilience.circuit_breaker().state("orders"),
        BreakerState::Open
    );

    // Open breaker: the fallback still answers, the operation stays cold.
    let c = Arc::clone(&calls);
    let result: Result<u32, GuardError<String>> = resilience
        .protect("orders", move || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err("connection refused".to_string())
            }
        })
        .await;
    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(
        resilience.circuit_breaker().metrics("orders").unwrap().rejected_count,
        1
    );

    // Every slot came back despite six failed invocations.
    assert_eq!(resilience.bulkhead().available_slots("orders"), Some(2));
}

/// The cached-fallback loop: successes feed the cache, an outage serves the
/// last good value.
#[tokio::test]
async fn cached_fallback_survives_an_outage() {
    let resilience = Resilience::new();
    resilience.register_fallback::<String, String>("profile", FallbackStrategy::Cached);
    resilience.configure_retry("profile", RetryRule::builder().max_retries(0).build());

    let warm: Result<String, GuardError<String>> = resilience
        .protect("profile", || async { Ok("alice".to_string()) })
        .await;
    assert_eq!(warm.unwrap(), "alice");

    let outage: Result<String, GuardError<String>> = resilience
        .protect("profile", || async { Err("db down".to_string()) })
        .await;
    assert_eq!(outage.unwrap(), "alice");
}

/// Global degradation short-circuits every resource; recovery restores the
/// normal path.
#[tokio::test]
async fn global_degradation_switch() {
    let resilience = Resilience::new();
    resilience.register_degraded_implementation("search", || vec!["fallback-hit".to_string()]);
    resilience.enable_global_degradation();

    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let degraded: Result<Vec<String>, GuardError<String>> = resilience
        .protect("search", move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok(vec!["real-hit".to_string()]) }
        })
        .await;
    assert_eq!(degraded.unwrap(), vec!["fallback-hit".to_string()]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // A resource with no registered implementation serves the zero value.
    let empty: Result<Vec<String>, GuardError<String>> = resilience
        .protect("other", || async { Ok(vec!["real".to_string()]) })
        .await;
    assert_eq!(empty.unwrap(), Vec::<String>::new());

    resilience.disable_global_degradation();
    let normal: Result<Vec<String>, GuardError<String>> = resilience
        .protect("search", || async { Ok(vec!["real-hit".to_string()]) })
        .await;
    assert_eq!(normal.unwrap(), vec!["real-hit".to_string()]);
}
