//! Per-resource concurrency isolation.
//!
//! A [`Bulkhead`] caps how many calls may run at once for each resource
//! name, so one slow dependency cannot swallow every task in the host. A
//! call either enters immediately, waits in a bounded queue for a slot, or
//! is rejected as a value ([`BulkheadError`]).
//!
//! Admission returns a [`BulkheadPermit`]; the slot is released when the
//! permit drops. That makes release-on-every-exit-path — success, error, or
//! cancellation mid-await — a property of ownership rather than caller
//! discipline, which is the load-bearing invariant of this component.
//!
//! ```
//! use rampart_bulkhead::{Bulkhead, BulkheadConfig};
//!
//! # async fn example() {
//! let bulkhead = Bulkhead::new();
//! bulkhead.configure("db", BulkheadConfig::builder().max_concurrent_calls(8).build());
//!
//! if let Ok(_permit) = bulkhead.try_enter("db").await {
//!     // do the guarded work; the slot frees when _permit drops
//! }
//! # }
//! ```

mod config;
mod error;
mod events;

pub use config::{BulkheadConfig, BulkheadConfigBuilder};
pub use error::BulkheadError;
pub use events::BulkheadEvent;

use dashmap::DashMap;
use rampart_core::{EventListener, EventListeners, GuardError};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

struct Shard {
    semaphore: Arc<Semaphore>,
    waiting: AtomicUsize,
    config: BulkheadConfig,
}

impl Shard {
    fn new(config: BulkheadConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_calls)),
            waiting: AtomicUsize::new(0),
            config,
        }
    }
}

/// Registry of concurrency caps keyed by resource name.
pub struct Bulkhead {
    shards: DashMap<String, Arc<Shard>>,
    default_config: BulkheadConfig,
    listeners: EventListeners<BulkheadEvent>,
}

/// An occupied bulkhead slot. Dropping it releases the slot.
pub struct BulkheadPermit {
    _permit: OwnedSemaphorePermit,
    resource: String,
    acquired_at: Instant,
    listeners: EventListeners<BulkheadEvent>,
}

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        self.listeners.emit(&BulkheadEvent::CallFinished {
            resource: self.resource.clone(),
            timestamp: Instant::now(),
            held_for: self.acquired_at.elapsed(),
        });
    }
}

/// Decrements the waiting count even if the waiter is cancelled mid-await.
struct WaitingGuard<'a>(&'a AtomicUsize);

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Bulkhead {
    /// Creates a registry with default parameters for unconfigured
    /// resources.
    pub fn new() -> Self {
        Self {
            shards: DashMap::new(),
            default_config: BulkheadConfig::default(),
            listeners: EventListeners::new(),
        }
    }

    /// Sets the parameters applied to resources used before being
    /// explicitly configured.
    pub fn default_config(mut self, config: BulkheadConfig) -> Self {
        self.default_config = config;
        self
    }

    /// Adds an event listener. Call before sharing the registry.
    pub fn subscribe<L>(&mut self, listener: L)
    where
        L: EventListener<BulkheadEvent> + 'static,
    {
        self.listeners.add(listener);
    }

    /// Applies `config` to `resource`.
    ///
    /// Idempotent: identical values keep the existing shard (and its
    /// occupied slots). Changed values install a fresh shard; calls already
    /// running keep their old permits, which drain harmlessly into the
    /// replaced semaphore.
    pub fn configure(&self, resource: &str, config: BulkheadConfig) {
        match self.shards.entry(resource.to_string()) {
            dashmap::Entry::Occupied(mut entry) => {
                if entry.get().config != config {
                    entry.insert(Arc::new(Shard::new(config)));
                }
            }
            dashmap::Entry::Vacant(entry) => {
                entry.insert(Arc::new(Shard::new(config)));
            }
        }
    }

    /// Attempts to occupy a slot for `resource`.
    ///
    /// Enters immediately when a slot is free; otherwise joins the waiting
    /// queue (if it has room) for up to the configured wait timeout.
    pub async fn try_enter(&self, resource: &str) -> Result<BulkheadPermit, BulkheadError> {
        let shard = self.shard(resource);
        let config = shard.config;

        let permit = match Arc::clone(&shard.semaphore).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let queued = shard
                    .waiting
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                        (n < config.waiting_queue_capacity).then_some(n + 1)
                    })
                    .is_ok();
                if !queued {
                    return Err(self.reject(
                        resource,
                        BulkheadError::Full {
                            resource: resource.to_string(),
                            max_concurrent_calls: config.max_concurrent_calls,
                        },
                    ));
                }
                let _waiting = WaitingGuard(&shard.waiting);
                let started = Instant::now();

                let acquired = match config.wait_timeout {
                    Some(timeout) => {
                        match tokio::time::timeout(
                            timeout,
                            Arc::clone(&shard.semaphore).acquire_owned(),
                        )
                        .await
                        {
                            Ok(Ok(permit)) => Ok(permit),
                            // The semaphore is never closed; treat it as full.
                            Ok(Err(_)) => Err(BulkheadError::Full {
                                resource: resource.to_string(),
                                max_concurrent_calls: config.max_concurrent_calls,
                            }),
                            Err(_) => Err(BulkheadError::Timeout {
                                resource: resource.to_string(),
                                waited: started.elapsed(),
                                max_concurrent_calls: config.max_concurrent_calls,
                            }),
                        }
                    }
                    None => Arc::clone(&shard.semaphore).acquire_owned().await.map_err(|_| {
                        BulkheadError::Full {
                            resource: resource.to_string(),
                            max_concurrent_calls: config.max_concurrent_calls,
                        }
                    }),
                };
                match acquired {
                    Ok(permit) => permit,
                    Err(err) => return Err(self.reject(resource, err)),
                }
            }
        };

        let active_calls = config.max_concurrent_calls - shard.semaphore.available_permits();
        self.listeners.emit(&BulkheadEvent::CallPermitted {
            resource: resource.to_string(),
            timestamp: Instant::now(),
            active_calls,
        });

        #[cfg(feature = "metrics")]
        gauge!("bulkhead_active_calls", "resource" => resource.to_string())
            .set(active_calls as f64);

        Ok(BulkheadPermit {
            _permit: permit,
            resource: resource.to_string(),
            acquired_at: Instant::now(),
            listeners: self.listeners.clone(),
        })
    }

    /// Runs `op` inside `resource`'s bulkhead, releasing the slot on every
    /// exit path.
    pub async fn execute<F, Fut, T, E>(&self, resource: &str, op: F) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let _permit = self.try_enter(resource).await?;
        op().await.map_err(GuardError::Operation)
    }

    /// Calls currently running inside `resource`'s bulkhead, or `None` if the
    /// resource has never been seen. Never creates a shard.
    pub fn active_count(&self, resource: &str) -> Option<usize> {
        self.shards
            .get(resource)
            .map(|shard| shard.config.max_concurrent_calls - shard.semaphore.available_permits())
    }

    /// Free slots for `resource`, or `None` if the resource has never been
    /// seen.
    pub fn available_slots(&self, resource: &str) -> Option<usize> {
        self.shards
            .get(resource)
            .map(|shard| shard.semaphore.available_permits())
    }

    /// Names of every resource with a live shard.
    pub fn resources(&self) -> Vec<String> {
        self.shards.iter().map(|e| e.key().clone()).collect()
    }

    /// Drops `resource`'s shard entirely.
    pub fn remove(&self, resource: &str) {
        self.shards.remove(resource);
    }

    /// Drops every shard. Administrative/test use.
    pub fn reset_all(&self) {
        self.shards.clear();
    }

    fn reject(&self, resource: &str, err: BulkheadError) -> BulkheadError {
        #[cfg(feature = "tracing")]
        tracing::debug!(resource, %err, "bulkhead rejected a call");

        self.listeners.emit(&BulkheadEvent::CallRejected {
            resource: resource.to_string(),
            timestamp: Instant::now(),
        });

        #[cfg(feature = "metrics")]
        counter!("bulkhead_rejections_total", "resource" => resource.to_string()).increment(1);

        err
    }

    fn shard(&self, resource: &str) -> Arc<Shard> {
        if let Some(shard) = self.shards.get(resource) {
            return Arc::clone(&shard);
        }
        Arc::clone(
            self.shards
                .entry(resource.to_string())
                .or_insert_with(|| Arc::new(Shard::new(self.default_config)))
                .value(),
        )
    }
}

impl Default for Bulkhead {
    fn default() -> Self {
        Self::new()
    }
}
