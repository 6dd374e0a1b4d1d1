use rampart_ratelimiter::{RateLimitAlgorithm, RateLimitConfig, RateLimiter};
use std::sync::Arc;
use std::time::Duration;

fn fixed(max: u64, window: Duration) -> RateLimitConfig {
    RateLimitConfig::builder()
        .max_permits(max)
        .window(window)
        .algorithm(RateLimitAlgorithm::FixedWindow)
        .build()
}

/// The canonical admission cycle: five admitted, the sixth shed, admission
/// restored once the window rolls over.
#[tokio::test]
async fn five_per_window_then_shed_then_resume() {
    let limiter = RateLimiter::new();
    limiter.configure("api", fixed(5, Duration::from_millis(100)));

    for _ in 0..5 {
        assert!(limiter.try_acquire("api"));
    }
    assert!(!limiter.try_acquire("api"));
    assert_eq!(limiter.available_permits("api"), Some(0));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(limiter.try_acquire("api"));
}

#[tokio::test]
async fn acquire_timeout_succeeds_once_the_window_rolls() {
    let limiter = RateLimiter::new();
    limiter.configure("api", fixed(1, Duration::from_millis(50)));

    assert!(limiter.try_acquire("api"));
    assert!(
        limiter
            .acquire_timeout("api", Duration::from_millis(500))
            .await
    );
}

#[tokio::test]
async fn reset_time_counts_down_to_the_rollover() {
    let limiter = RateLimiter::new();
    limiter.configure("api", fixed(1, Duration::from_secs(10)));

    assert!(limiter.try_acquire("api"));
    let remaining = limiter.reset_time_ms("api").unwrap();
    assert!(remaining > 0 && remaining <= 10_000);
}

/// Concurrent callers against a shared limiter never overshoot the window
/// budget.
#[tokio::test]
async fn concurrent_callers_stay_within_budget() {
    let limiter = Arc::new(RateLimiter::new());
    limiter.configure("api", fixed(10, Duration::from_secs(10)));

    let tasks: Vec<_> = (0..40)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.try_acquire("api") })
        })
        .collect();

    let mut granted = 0;
    for task in tasks {
        if task.await.unwrap() {
            granted += 1;
        }
    }
    assert_eq!(granted, 10);
}
