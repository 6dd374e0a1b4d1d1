use rampart_ratelimiter::{RateLimitAlgorithm, RateLimitConfig, RateLimiter};
use std::time::Duration;

fn configured(algorithm: RateLimitAlgorithm, max: u64, window: Duration) -> RateLimiter {
    let limiter = RateLimiter::new();
    limiter.configure(
        "svc",
        RateLimitConfig::builder()
            .max_permits(max)
            .window(window)
            .algorithm(algorithm)
            .build(),
    );
    limiter
}

#[tokio::test]
async fn token_bucket_refills_while_idle() {
    let limiter = configured(RateLimitAlgorithm::TokenBucket, 10, Duration::from_secs(1));

    // Burst the whole bucket, then wait for roughly half of it back.
    assert!(limiter.try_acquire_many("svc", 10));
    assert!(!limiter.try_acquire("svc"));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(limiter.try_acquire_many("svc", 4));
}

#[tokio::test]
async fn leaky_bucket_drains_while_idle() {
    let limiter = configured(RateLimitAlgorithm::LeakyBucket, 5, Duration::from_millis(500));

    assert!(limiter.try_acquire_many("svc", 5));
    assert!(!limiter.try_acquire("svc"));

    // ~3 permits drain in 300ms at 10/s; ask for 2 to leave slack.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(limiter.try_acquire_many("svc", 2));
}

#[tokio::test]
async fn concurrent_algorithm_frees_permits_on_release() {
    let limiter = configured(RateLimitAlgorithm::Concurrent, 2, Duration::from_secs(1));

    assert!(limiter.try_acquire("svc"));
    assert!(limiter.try_acquire("svc"));
    assert!(!limiter.try_acquire("svc"));

    // Time passing alone restores nothing for this algorithm.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!limiter.try_acquire("svc"));

    limiter.release("svc");
    assert!(limiter.try_acquire("svc"));
}

#[tokio::test]
async fn sliding_window_smooths_the_boundary() {
    let limiter = configured(RateLimitAlgorithm::SlidingWindow, 10, Duration::from_millis(200));

    assert!(limiter.try_acquire_many("svc", 10));
    assert!(!limiter.try_acquire("svc"));

    // Just past the boundary the previous window still weighs in, so a
    // full burst stays rejected.
    tokio::time::sleep(Duration::from_millis(220)).await;
    assert!(!limiter.try_acquire_many("svc", 10));

    // Two idle windows later all history is forgotten.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(limiter.try_acquire_many("svc", 10));
}
