//! Orchestrator configuration.

use crate::events::FallbackEvent;
use crate::strategy::{default_strategies, StrategyKind};
use crate::OperationOptions;
use hostguard_core::{EventListener, FnListener, Listeners};
use std::sync::Arc;
use std::time::Duration;

/// Factory producing a type-specific placeholder response.
///
/// The original system hard-coded placeholder payloads per operation type;
/// with a generic response type the caller supplies the factory instead. A
/// strategy whose factory is absent simply fails over to the next one.
pub type ResponseFactory<T> = Arc<dyn Fn(&OperationOptions) -> T + Send + Sync>;

/// Configuration for a [`FallbackOrchestrator`](crate::FallbackOrchestrator).
pub struct FallbackConfig<T> {
    pub(crate) strategies: Vec<StrategyKind>,
    pub(crate) default_timeout: Duration,
    pub(crate) max_retries: u32,
    pub(crate) retry_delay: Duration,
    pub(crate) cache_ttl: Duration,
    pub(crate) cache_capacity: usize,
    pub(crate) queue_capacity: usize,
    pub(crate) queue_retry_interval: Duration,
    pub(crate) queue_max_attempts: u32,
    pub(crate) breaker_failure_threshold: u32,
    pub(crate) static_response: Option<ResponseFactory<T>>,
    pub(crate) default_response: Option<ResponseFactory<T>>,
    pub(crate) queued_response: Option<ResponseFactory<T>>,
    pub(crate) listeners: Listeners<FallbackEvent>,
}

impl<T> FallbackConfig<T> {
    /// Creates a configuration builder.
    pub fn builder() -> FallbackConfigBuilder<T> {
        FallbackConfigBuilder::new()
    }
}

impl<T> Default for FallbackConfig<T> {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`FallbackConfig`].
pub struct FallbackConfigBuilder<T> {
    config: FallbackConfig<T>,
}

impl<T> FallbackConfigBuilder<T> {
    /// Creates a builder with defaults: all strategies enabled in priority
    /// order, 30s timeout, 3 retries from 1s, 5-minute cache, patient queue.
    pub fn new() -> Self {
        Self {
            config: FallbackConfig {
                strategies: default_strategies(),
                default_timeout: Duration::from_secs(30),
                max_retries: 3,
                retry_delay: Duration::from_secs(1),
                cache_ttl: Duration::from_secs(300),
                cache_capacity: 1000,
                queue_capacity: 10_000,
                queue_retry_interval: Duration::from_secs(60),
                queue_max_attempts: 5,
                breaker_failure_threshold: 5,
                static_response: None,
                default_response: None,
                queued_response: None,
                listeners: Listeners::new(),
            },
        }
    }

    /// Replaces the enabled strategy set (in priority order).
    pub fn strategies(mut self, strategies: Vec<StrategyKind>) -> Self {
        self.config.strategies = strategies;
        self
    }

    /// Default per-attempt deadline. Default: 30s
    pub fn default_timeout(mut self, d: Duration) -> Self {
        self.config.default_timeout = d;
        self
    }

    /// Retries beyond the first attempt in retry-with-backoff. Default: 3
    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    /// Initial backoff delay; doubles per attempt. Default: 1s
    pub fn retry_delay(mut self, d: Duration) -> Self {
        self.config.retry_delay = d;
        self
    }

    /// Time-to-live for cached results. Default: 5 minutes
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    /// Cache capacity. Default: 1000 entries
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    /// Deferred-retry queue capacity. Default: 10000 items
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Queue drain interval; also the base of its linear backoff.
    /// Default: 60s
    pub fn queue_retry_interval(mut self, d: Duration) -> Self {
        self.config.queue_retry_interval = d;
        self
    }

    /// Attempt budget for parked operations; the strategy's immediate
    /// attempt counts as the first. The continuation is rejected once the
    /// counter exceeds this. Default: 5
    pub fn queue_max_attempts(mut self, n: u32) -> Self {
        self.config.queue_max_attempts = n;
        self
    }

    /// Failure threshold for breakers the orchestrator creates on demand.
    /// Default: 5
    pub fn breaker_failure_threshold(mut self, n: u32) -> Self {
        self.config.breaker_failure_threshold = n;
        self
    }

    /// Placeholder response for the static-fallback strategy.
    pub fn static_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationOptions) -> T + Send + Sync + 'static,
    {
        self.config.static_response = Some(Arc::new(f));
        self
    }

    /// Default response for the cached-response strategy's miss-and-failure
    /// path.
    pub fn default_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationOptions) -> T + Send + Sync + 'static,
    {
        self.config.default_response = Some(Arc::new(f));
        self
    }

    /// Acknowledgement returned by queue-and-retry when the caller asked
    /// for an immediate answer.
    pub fn queued_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationOptions) -> T + Send + Sync + 'static,
    {
        self.config.queued_response = Some(Arc::new(f));
        self
    }

    /// Adds a raw event listener.
    pub fn listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<FallbackEvent> + 'static,
    {
        self.config.listeners.add(listener);
        self
    }

    /// Registers a callback for recoveries, receiving the winning strategy.
    pub fn on_recovery<F>(mut self, f: F) -> Self
    where
        F: Fn(StrategyKind) + Send + Sync + 'static,
    {
        self.config
            .listeners
            .add(FnListener::new(move |event: &FallbackEvent| {
                if let FallbackEvent::Recovered { strategy, .. } = event {
                    f(*strategy);
                }
            }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> FallbackConfig<T> {
        self.config
    }
}

impl<T> Default for FallbackConfigBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
