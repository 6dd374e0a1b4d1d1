use rampart_circuitbreaker::{BreakerConfig, BreakerState, CircuitBreaker};
use std::time::Duration;

/// The full lifecycle with wall-clock time: enough failures open the
/// breaker, the open delay elapses, the half-open trials close it again.
#[tokio::test]
async fn open_half_open_closed_cycle() {
    let breaker = CircuitBreaker::new();
    breaker.configure(
        "db",
        BreakerConfig::builder()
            .failure_ratio(0.5)
            .request_volume_threshold(20)
            .open_duration(Duration::from_millis(50))
            .success_threshold(2)
            .build(),
    );

    for _ in 0..10 {
        breaker.record_success("db");
    }
    for _ in 0..10 {
        breaker.record_failure("db");
    }
    assert_eq!(breaker.state("db"), BreakerState::Open);

    // Rejections while open are tallied separately from failures.
    assert!(!breaker.is_call_permitted("db"));
    assert!(!breaker.is_call_permitted("db"));
    let metrics = breaker.metrics("db").unwrap();
    assert_eq!(metrics.rejected_count, 2);

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(breaker.is_call_permitted("db"));
    assert_eq!(breaker.state("db"), BreakerState::HalfOpen);

    breaker.record_success("db");
    assert_eq!(breaker.state("db"), BreakerState::HalfOpen);
    breaker.record_success("db");
    assert_eq!(breaker.state("db"), BreakerState::Closed);

    // Closing wipes the outcome counters for the new measuring period.
    let metrics = breaker.metrics("db").unwrap();
    assert_eq!(metrics.success_count, 0);
    assert_eq!(metrics.failure_count, 0);
}

#[tokio::test]
async fn half_open_failure_reopens_and_restarts_the_delay() {
    let breaker = CircuitBreaker::new();
    breaker.configure(
        "db",
        BreakerConfig::builder()
            .failure_ratio(1.0)
            .request_volume_threshold(2)
            .open_duration(Duration::from_millis(40))
            .success_threshold(1)
            .build(),
    );

    breaker.record_failure("db");
    breaker.record_failure("db");
    assert_eq!(breaker.state("db"), BreakerState::Open);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(breaker.is_call_permitted("db"));
    assert_eq!(breaker.state("db"), BreakerState::HalfOpen);

    breaker.record_failure("db");
    assert_eq!(breaker.state("db"), BreakerState::Open);

    // The fresh open period applies in full.
    assert!(!breaker.is_call_permitted("db"));
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(breaker.is_call_permitted("db"));
}

#[tokio::test]
async fn below_volume_threshold_failures_do_not_open() {
    let breaker = CircuitBreaker::new();
    breaker.configure(
        "db",
        BreakerConfig::builder()
            .failure_ratio(0.5)
            .request_volume_threshold(10)
            .build(),
    );

    // 100% failures, but not enough volume to judge.
    for _ in 0..9 {
        breaker.record_failure("db");
    }
    assert_eq!(breaker.state("db"), BreakerState::Closed);
    assert!(breaker.is_call_permitted("db"));

    breaker.record_failure("db");
    assert_eq!(breaker.state("db"), BreakerState::Open);
}
