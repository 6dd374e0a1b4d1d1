use futures::future::join_all;
use rampart_bulkhead::{Bulkhead, BulkheadConfig, BulkheadError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fifty callers against a cap of four: everyone eventually runs, and the
/// observed concurrency never exceeds the cap.
#[tokio::test]
async fn heavy_load_never_exceeds_the_cap() {
    let bulkhead = Arc::new(Bulkhead::new());
    bulkhead.configure(
        "db",
        BulkheadConfig::builder()
            .max_concurrent_calls(4)
            .waiting_queue_capacity(50)
            .wait_timeout(Duration::from_secs(10))
            .build(),
    );

    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let bulkhead = Arc::clone(&bulkhead);
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                let _permit = bulkhead.try_enter("db").await.unwrap();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            })
        })
        .collect();
    join_all(tasks).await.into_iter().for_each(|r| r.unwrap());

    assert!(peak.load(Ordering::SeqCst) <= 4);
    assert_eq!(bulkhead.active_count("db"), Some(0));
    assert_eq!(bulkhead.available_slots("db"), Some(4));
}

/// Saturating one resource leaves another's slots untouched.
#[tokio::test]
async fn resources_are_isolated() {
    let bulkhead = Bulkhead::new();
    let tight = BulkheadConfig::builder()
        .max_concurrent_calls(1)
        .waiting_queue_capacity(0)
        .wait_timeout(Duration::from_millis(10))
        .build();
    bulkhead.configure("slow", tight);
    bulkhead.configure("fast", tight);

    let _held = bulkhead.try_enter("slow").await.unwrap();
    let overflow = bulkhead.try_enter("slow").await;
    assert!(matches!(overflow, Err(BulkheadError::Full { .. })));

    assert!(bulkhead.try_enter("fast").await.is_ok());
}

/// A queue seat freed by a timed-out waiter is available to the next caller.
#[tokio::test]
async fn queue_seats_recycle_after_timeouts() {
    let bulkhead = Bulkhead::new();
    bulkhead.configure(
        "db",
        BulkheadConfig::builder()
            .max_concurrent_calls(1)
            .waiting_queue_capacity(1)
            .wait_timeout(Duration::from_millis(20))
            .build(),
    );

    let _held = bulkhead.try_enter("db").await.unwrap();
    for _ in 0..3 {
        let result = bulkhead.try_enter("db").await;
        assert!(matches!(result, Err(BulkheadError::Timeout { .. })));
    }
}
