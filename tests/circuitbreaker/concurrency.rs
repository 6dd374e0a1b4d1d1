use rampart_circuitbreaker::{BreakerConfig, BreakerState, CircuitBreaker};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Failures racing past the threshold must produce exactly one
/// closed-to-open transition, however many tasks observe it.
#[tokio::test]
async fn threshold_race_produces_a_single_transition() {
    let opened = Arc::new(AtomicUsize::new(0));
    let o = Arc::clone(&opened);

    let mut breaker = CircuitBreaker::new().default_config(
        BreakerConfig::builder()
            .failure_ratio(1.0)
            .request_volume_threshold(10)
            .build(),
    );
    breaker.on_state_transition(move |_, _, to| {
        if to == BreakerState::Open {
            o.fetch_add(1, Ordering::SeqCst);
        }
    });
    let breaker = Arc::new(breaker);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let breaker = Arc::clone(&breaker);
            tokio::spawn(async move {
                for _ in 0..5 {
                    breaker.record_failure("db");
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(breaker.state("db"), BreakerState::Open);
    assert_eq!(opened.load(Ordering::SeqCst), 1);
}

/// Half-open admits exactly `success_threshold` trial calls; the rest are
/// rejected until an outcome settles the state.
#[tokio::test]
async fn half_open_trial_budget_is_bounded() {
    let breaker = CircuitBreaker::new();
    breaker.configure(
        "db",
        BreakerConfig::builder()
            .failure_ratio(1.0)
            .request_volume_threshold(1)
            .open_duration(Duration::from_millis(30))
            .success_threshold(2)
            .build(),
    );

    breaker.record_failure("db");
    assert_eq!(breaker.state("db"), BreakerState::Open);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let admitted = (0..5).filter(|_| breaker.is_call_permitted("db")).count();
    assert_eq!(admitted, 2);
    assert_eq!(breaker.state("db"), BreakerState::HalfOpen);
}
