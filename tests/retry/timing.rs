use rampart_core::GuardError;
use rampart_retry::{BackoffStrategy, RetryExecutor, RetryRule};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Exponential backoff at a 100ms base sleeps 100 + 200 + 400 ms across
/// three retries, and the operation runs exactly four times.
#[tokio::test]
async fn exponential_backoff_spends_the_scheduled_delays() {
    let executor = RetryExecutor::new();
    executor.configure(
        "api",
        RetryRule::builder()
            .max_retries(3)
            .delay(Duration::from_millis(100))
            .strategy(BackoffStrategy::Exponential)
            .build(),
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let started = Instant::now();
    let result: Result<(), _> = executor
        .execute("api", move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("down") }
        })
        .await;
    let elapsed = started.elapsed();

    assert!(matches!(
        result,
        Err(GuardError::RetriesExhausted { attempts: 4, .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(elapsed >= Duration::from_millis(700), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn recovery_midway_stops_the_sequence() {
    let executor = RetryExecutor::new();
    executor.configure(
        "api",
        RetryRule::builder()
            .max_retries(5)
            .delay(Duration::from_millis(10))
            .build(),
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let result = executor
        .execute("api", move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("flaky")
                } else {
                    Ok(n)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn non_retryable_errors_abort_immediately() {
    let executor = RetryExecutor::new();
    executor.configure(
        "api",
        RetryRule::builder()
            .max_retries(5)
            .delay(Duration::from_millis(10))
            .build(),
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let started = Instant::now();
    let result: Result<(), _> = executor
        .execute_with_condition(
            "api",
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("bad request") }
            },
            |e| *e != "bad request",
        )
        .await;

    assert!(matches!(result, Err(GuardError::Operation("bad request"))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() < Duration::from_millis(10));
}
