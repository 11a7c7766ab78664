//! Named-singleton registry over circuit breakers.
//!
//! The registry is an explicit value owned by the process's composition
//! root and threaded into whatever needs to look breakers up — there is no
//! module-level singleton. One live breaker exists per service name; the
//! configuration supplied on first use wins, later configurations for the
//! same name are ignored.

use crate::{BreakerConfig, BreakerEvent, CircuitBreaker, CircuitState, MetricsSnapshot};
use hostguard_core::{EventListener, FnListener, Listeners};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Registry of breakers for operations returning `T`.
pub struct BreakerRegistry<T> {
    breakers: Mutex<HashMap<String, CircuitBreaker<T>>>,
    /// Registry-level listeners, forwarded the events of every breaker the
    /// registry creates (including ones created before a listener joined).
    listeners: Arc<std::sync::Mutex<Listeners<BreakerEvent>>>,
}

impl<T> BreakerRegistry<T>
where
    T: Clone + Send + 'static,
{
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            listeners: Arc::new(std::sync::Mutex::new(Listeners::new())),
        }
    }

    /// Returns the breaker for `service`, creating it from `config` on
    /// first use. Options on subsequent calls for the same name are
    /// ignored — first writer wins.
    pub async fn get(&self, service: &str, config: impl FnOnce() -> BreakerConfig) -> CircuitBreaker<T> {
        let mut breakers = self.breakers.lock().await;
        if let Some(existing) = breakers.get(service) {
            return existing.clone();
        }

        let forward = Arc::clone(&self.listeners);
        let config = config().with_listener(FnListener::new(move |event: &BreakerEvent| {
            if let Ok(listeners) = forward.lock() {
                listeners.emit(event);
            }
        }));

        let breaker = CircuitBreaker::new(service, config);
        breakers.insert(service.to_string(), breaker.clone());
        breaker
    }

    /// Shuts down and forgets the breaker for `service`.
    ///
    /// Holders of clones should drop them; the name is free for a fresh
    /// breaker immediately.
    pub async fn remove(&self, service: &str) -> bool {
        let removed = self.breakers.lock().await.remove(service);
        match removed {
            Some(breaker) => {
                breaker.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Adds a listener receiving every registered breaker's events.
    pub fn add_listener<L>(&self, listener: L)
    where
        L: EventListener<BreakerEvent> + 'static,
    {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.add(listener);
        }
    }

    /// Current state of every registered breaker.
    pub async fn states(&self) -> HashMap<String, CircuitState> {
        let breakers = self.breakers.lock().await;
        breakers
            .iter()
            .map(|(name, b)| (name.clone(), b.current_state()))
            .collect()
    }

    /// Metrics snapshot of every registered breaker.
    pub async fn metrics(&self) -> HashMap<String, MetricsSnapshot> {
        let breakers = self.breakers.lock().await;
        let mut out = HashMap::with_capacity(breakers.len());
        for (name, breaker) in breakers.iter() {
            out.insert(name.clone(), breaker.metrics().await);
        }
        out
    }

    /// Resets every registered breaker's metrics.
    pub async fn reset_all(&self) {
        let breakers = self.breakers.lock().await;
        for breaker in breakers.values() {
            breaker.reset_metrics().await;
        }
    }

    /// Shuts down and forgets every breaker.
    pub async fn shutdown_all(&self) {
        let mut breakers = self.breakers.lock().await;
        for (_, breaker) in breakers.drain() {
            breaker.shutdown().await;
        }
    }
}

impl<T> Default for BreakerRegistry<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
