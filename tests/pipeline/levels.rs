use rampart_pipeline::{
    GuardError, ProtectionConfig, ProtectionLevel, RateLimitConfig, Resilience, RetryRule,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn light_level_ignores_the_rate_limiter() {
    let resilience = Resilience::new();
    resilience.configure_protection("svc", ProtectionConfig::at_level(ProtectionLevel::Light));
    resilience.configure_rate_limit("svc", RateLimitConfig::per_window(0, Duration::from_secs(60)));

    for _ in 0..10 {
        let result: Result<u32, GuardError<String>> =
            resilience.protect("svc", || async { Ok(1) }).await;
        assert!(result.is_ok());
    }
}

#[tokio::test]
async fn light_level_does_not_retry() {
    let resilience = Resilience::new();
    resilience.configure_protection("svc", ProtectionConfig::at_level(ProtectionLevel::Light));
    resilience.configure_retry(
        "svc",
        RetryRule::builder()
            .max_retries(5)
            .delay(Duration::from_millis(1))
            .build(),
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let result: Result<u32, GuardError<String>> = resilience
        .protect("svc", move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err("down".to_string()) }
        })
        .await;

    assert!(matches!(result, Err(GuardError::Operation(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn standard_level_retries_through_transient_failures() {
    let resilience = Resilience::new();
    resilience.configure_protection("svc", ProtectionConfig::at_level(ProtectionLevel::Standard));
    resilience.configure_retry(
        "svc",
        RetryRule::builder()
            .max_retries(3)
            .delay(Duration::from_millis(1))
            .build(),
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let result: Result<u32, GuardError<String>> = resilience
        .protect("svc", move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("flaky".to_string())
                } else {
                    Ok(9)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 9);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// The full pipeline's timeout bounds the whole retry sequence, and the
/// breaker records the timed-out invocation as a single failure.
#[tokio::test]
async fn full_level_timeout_cuts_the_retry_sequence_short() {
    let resilience = Resilience::new();
    resilience.configure_protection(
        "svc",
        ProtectionConfig::builder()
            .level(ProtectionLevel::Full)
            .timeout(Duration::from_millis(40))
            .build(),
    );
    resilience.configure_retry(
        "svc",
        RetryRule::builder()
            .max_retries(20)
            .delay(Duration::from_millis(15))
            .build(),
    );

    let result: Result<u32, GuardError<String>> = resilience
        .protect("svc", || async { Err("slow".to_string()) })
        .await;

    assert!(matches!(result, Err(GuardError::Timeout { .. })));
    let metrics = resilience.circuit_breaker().metrics("svc").unwrap();
    assert_eq!(metrics.failure_count, 1);
    assert_eq!(metrics.success_count, 0);
}

#[tokio::test]
async fn per_resource_levels_are_independent() {
    let resilience = Resilience::new();
    resilience.configure_protection("a", ProtectionConfig::at_level(ProtectionLevel::Light));
    resilience.configure_protection("b", ProtectionConfig::at_level(ProtectionLevel::Standard));

    assert_eq!(resilience.protection_of("a").level, ProtectionLevel::Light);
    assert_eq!(resilience.protection_of("b").level, ProtectionLevel::Standard);
    // Unconfigured resources get the default.
    assert_eq!(
        resilience.protection_of("c").level,
        ProtectionLevel::Full
    );
}
