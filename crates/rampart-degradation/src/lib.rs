//! Operator-driven degradation overrides.
//!
//! Degradation is orthogonal to circuit breaking: the breaker reacts to
//! observed outcomes, while degradation is switched by an operator (or an
//! administrative endpoint) to substitute a cheap implementation regardless
//! of recent history. A resource counts as degraded when the global switch
//! is on or its name has been degraded individually.
//!
//! [`execute`](DegradationRegistry::execute) consults the override first: if
//! the resource is degraded and a degraded implementation is registered,
//! that value is returned and the normal supplier is never invoked; if none
//! is registered the value type's [`Default`] stands in. This is a
//! documented zero value, not an error.
//!
//! ```
//! use rampart_degradation::DegradationRegistry;
//!
//! # async fn example() {
//! let registry = DegradationRegistry::new();
//! registry.register_degraded_implementation("recs", || vec!["top-seller".to_string()]);
//! registry.degrade("recs");
//!
//! let recs: Result<Vec<String>, ()> = registry
//!     .execute("recs", || async { unreachable!("degraded: never called") })
//!     .await;
//! assert_eq!(recs.unwrap(), vec!["top-seller".to_string()]);
//! # }
//! ```

use dashmap::{DashMap, DashSet};
use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type DegradedSupplier = Arc<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>;

/// Global and per-resource degradation switches plus registered degraded
/// implementations.
pub struct DegradationRegistry {
    global: AtomicBool,
    degraded: DashSet<String>,
    implementations: DashMap<String, DegradedSupplier>,
}

impl DegradationRegistry {
    /// Creates a registry with nothing degraded.
    pub fn new() -> Self {
        Self {
            global: AtomicBool::new(false),
            degraded: DashSet::new(),
            implementations: DashMap::new(),
        }
    }

    /// Whether `resource` is currently degraded (globally or individually).
    pub fn is_degraded(&self, resource: &str) -> bool {
        self.global.load(Ordering::Acquire) || self.degraded.contains(resource)
    }

    /// Degrades `resource`.
    pub fn degrade(&self, resource: &str) {
        #[cfg(feature = "tracing")]
        tracing::info!(resource, "resource degraded");
        self.degraded.insert(resource.to_string());
    }

    /// Recovers `resource` (the global switch may still apply).
    pub fn recover(&self, resource: &str) {
        #[cfg(feature = "tracing")]
        tracing::info!(resource, "resource recovered");
        self.degraded.remove(resource);
    }

    /// Degrades every resource at once.
    pub fn enable_global_degradation(&self) {
        #[cfg(feature = "tracing")]
        tracing::warn!("global degradation enabled");
        self.global.store(true, Ordering::Release);
    }

    /// Clears the global switch; individually degraded resources stay
    /// degraded.
    pub fn disable_global_degradation(&self) {
        #[cfg(feature = "tracing")]
        tracing::info!("global degradation disabled");
        self.global.store(false, Ordering::Release);
    }

    /// Whether the global switch is on.
    pub fn is_global_degraded(&self) -> bool {
        self.global.load(Ordering::Acquire)
    }

    /// Names of individually degraded resources.
    pub fn degraded_resources(&self) -> Vec<String> {
        self.degraded.iter().map(|r| r.key().clone()).collect()
    }

    /// Registers the cheap implementation substituted while `resource` is
    /// degraded. Re-registration replaces the previous one.
    pub fn register_degraded_implementation<T, F>(&self, resource: &str, supplier: F)
    where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.implementations.insert(
            resource.to_string(),
            Arc::new(move || Box::new(supplier()) as Box<dyn Any + Send>),
        );
    }

    /// Invokes `resource`'s registered degraded implementation, if one is
    /// registered and produces the requested type.
    pub fn degraded_value<T: 'static>(&self, resource: &str) -> Option<T> {
        let supplier = self.implementations.get(resource).map(|s| Arc::clone(&s))?;
        supplier().downcast::<T>().ok().map(|boxed| *boxed)
    }

    /// Runs `normal` unless `resource` is degraded; when degraded, returns
    /// the registered degraded value, or `T::default()` if none is
    /// registered. The normal supplier is never invoked while degraded.
    pub async fn execute<T, E, F, Fut>(&self, resource: &str, normal: F) -> Result<T, E>
    where
        T: Default + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if self.is_degraded(resource) {
            return Ok(self.degraded_value(resource).unwrap_or_default());
        }
        normal().await
    }

    /// Like [`execute`](Self::execute), but with an explicit degraded
    /// supplier that takes precedence over any registered implementation.
    pub async fn execute_or<T, E, F, Fut, D>(
        &self,
        resource: &str,
        normal: F,
        degraded: D,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        D: FnOnce() -> T,
    {
        if self.is_degraded(resource) {
            return Ok(degraded());
        }
        normal().await
    }

    /// Removes `resource`'s switch and registered implementation.
    pub fn remove(&self, resource: &str) {
        self.degraded.remove(resource);
        self.implementations.remove(resource);
    }

    /// Clears every switch and implementation. Administrative/test use.
    pub fn reset_all(&self) {
        self.global.store(false, Ordering::Release);
        self.degraded.clear();
        self.implementations.clear();
    }
}

impl Default for DegradationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
