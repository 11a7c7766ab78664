//! Multi-strategy fallback orchestration.
//!
//! [`FallbackOrchestrator::execute_with_fallback`] runs an operation behind
//! an ordered chain of recovery strategies: the first strategy to produce a
//! result wins and the chain stops; a strategy failure is recorded and the
//! next one runs; when every strategy fails the last error is surfaced
//! inside [`FallbackError::Exhausted`].
//!
//! Strategy order comes from caller preference, from the operation type
//! (reads favor cache, writes favor retry, critical calls favor the circuit
//! breaker), or from the default priority order.
//!
//! ```rust,no_run
//! use hostguard_breaker::BreakerRegistry;
//! use hostguard_fallback::{operation, FallbackConfig, FallbackOrchestrator, OperationOptions};
//! use std::sync::Arc;
//!
//! # #[derive(Debug)] struct LookupError;
//! # impl std::fmt::Display for LookupError {
//! #     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "lookup failed") }
//! # }
//! # async fn example() {
//! let registry = Arc::new(BreakerRegistry::new());
//! let orchestrator: FallbackOrchestrator<String, LookupError> =
//!     FallbackOrchestrator::new(FallbackConfig::default(), registry);
//!
//! let op = operation(|_opts| async { Ok::<_, LookupError>("payload".to_string()) });
//! let result = orchestrator
//!     .execute_with_fallback(op, OperationOptions::default())
//!     .await;
//! # let _ = result;
//! # }
//! ```

mod config;
mod error;
mod events;
mod queue;
mod stats;
mod strategy;

pub use config::{FallbackConfig, FallbackConfigBuilder, ResponseFactory};
pub use error::FallbackError;
pub use events::FallbackEvent;
pub use stats::StrategyStats;
pub use strategy::{
    default_strategies, Feature, FeaturePriority, OperationType, StrategyKind,
};

use futures::future::BoxFuture;
use hostguard_breaker::{
    BreakerConfig, BreakerRegistry, CallOptions as BreakerCallOptions, Endpoint,
};
use hostguard_core::TtlCache;
use queue::RetryQueue;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A type-erased, re-invocable operation.
pub type Operation<T, E> =
    Arc<dyn Fn(OperationOptions) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// Wraps an async closure as an [`Operation`].
pub fn operation<T, E, F, Fut>(f: F) -> Operation<T, E>
where
    F: Fn(OperationOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    Arc::new(move |opts| Box::pin(f(opts)))
}

/// Per-call options; every field has a neutral default.
#[derive(Debug, Clone, Default)]
pub struct OperationOptions {
    /// Service name used for breaker lookup, cache keys, and events.
    pub service_name: Option<String>,
    /// Biases strategy ordering.
    pub operation_type: OperationType,
    /// Cache key override; derived from service name and type when unset.
    pub cache_key: Option<String>,
    /// Per-attempt deadline override.
    pub timeout: Option<Duration>,
    /// Retry-with-backoff budget override.
    pub max_retries: Option<u32>,
    /// Initial backoff delay override.
    pub retry_delay: Option<Duration>,
    /// Features available for graceful degradation to drop.
    pub features: Vec<Feature>,
    /// Set by graceful degradation on its reduced retry.
    pub degraded: bool,
    /// Target override; set by alternative-service on retargeted attempts.
    pub endpoint: Option<Endpoint>,
    /// Alternatives for the alternative-service strategy.
    pub alternatives: Vec<Endpoint>,
    /// Restricts and orders the strategy chain for this call.
    pub preferred_strategies: Option<Vec<StrategyKind>>,
    /// Queue-and-retry: acknowledge immediately instead of waiting for the
    /// queued outcome (requires a `queued_response` factory).
    pub immediate_ack: bool,
}

struct Inner<T, E> {
    config: FallbackConfig<T>,
    registry: Arc<BreakerRegistry<T>>,
    cache: Mutex<TtlCache<String, T>>,
    queue: RetryQueue<T, E>,
    stats: Mutex<HashMap<StrategyKind, StrategyStats>>,
    op_seq: AtomicU64,
}

/// Orchestrates an operation through an ordered set of fallback strategies.
pub struct FallbackOrchestrator<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for FallbackOrchestrator<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Aggregate view over the orchestrator's durable state.
#[derive(Debug, Clone)]
pub struct OrchestratorStats {
    /// Per-strategy outcome counters.
    pub strategies: HashMap<StrategyKind, StrategyStats>,
    /// Operations currently parked on the retry queue.
    pub queue_depth: usize,
    /// Entries currently in the result cache.
    pub cache_size: usize,
}

impl<T, E> FallbackOrchestrator<T, E>
where
    T: Clone + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    /// Creates an orchestrator delegating breaker lookups to `registry`.
    pub fn new(config: FallbackConfig<T>, registry: Arc<BreakerRegistry<T>>) -> Self {
        let queue = RetryQueue::new(
            config.queue_capacity,
            config.queue_retry_interval,
            config.queue_max_attempts,
            config.default_timeout,
            config.listeners.clone(),
        );
        let cache_capacity = config.cache_capacity;
        Self {
            inner: Arc::new(Inner {
                cache: Mutex::new(TtlCache::new(cache_capacity)),
                queue,
                stats: Mutex::new(HashMap::new()),
                op_seq: AtomicU64::new(0),
                config,
                registry,
            }),
        }
    }

    /// Runs `op` through the selected strategy chain.
    pub async fn execute_with_fallback(
        &self,
        op: Operation<T, E>,
        options: OperationOptions,
    ) -> Result<T, FallbackError<E>> {
        let inner = &self.inner;
        let op_id = inner.op_seq.fetch_add(1, Ordering::Relaxed);
        let service = source_name(&options);
        let chain = strategy::select(
            &inner.config.strategies,
            options.preferred_strategies.as_deref(),
            options.operation_type,
        );

        let mut attempted: Vec<StrategyKind> = Vec::new();
        let mut last_error: Option<FallbackError<E>> = None;

        for kind in chain {
            inner.config.listeners.emit(&FallbackEvent::Attempt {
                service: service.clone(),
                at: Instant::now(),
                op_id,
                strategy: kind,
            });

            let started = Instant::now();
            attempted.push(kind);

            match self.run_strategy(kind, &op, &options).await {
                Ok(value) => {
                    let duration = started.elapsed();
                    // One batched stats update per call: the winner is
                    // credited, every strategy that failed before it is
                    // debited.
                    let mut stats = inner.stats.lock().await;
                    for failed in &attempted[..attempted.len() - 1] {
                        stats.entry(*failed).or_default().record_failure();
                    }
                    stats.entry(kind).or_default().record_success(duration);
                    drop(stats);

                    inner.config.listeners.emit(&FallbackEvent::Recovered {
                        service: service.clone(),
                        at: Instant::now(),
                        op_id,
                        strategy: kind,
                        duration,
                    });

                    #[cfg(feature = "metrics")]
                    ::metrics::counter!("fallback_outcomes_total", "strategy" => kind.name(), "outcome" => "success").increment(1);

                    return Ok(value);
                }
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        service = %service,
                        strategy = kind.name(),
                        error = %err,
                        "fallback strategy failed"
                    );

                    inner.config.listeners.emit(&FallbackEvent::StrategyFailed {
                        service: service.clone(),
                        at: Instant::now(),
                        op_id,
                        strategy: kind,
                        error: err.to_string(),
                    });
                    last_error = Some(err);
                }
            }
        }

        let mut stats = inner.stats.lock().await;
        for kind in &attempted {
            stats.entry(*kind).or_default().record_failure();

            #[cfg(feature = "metrics")]
            ::metrics::counter!("fallback_outcomes_total", "strategy" => kind.name(), "outcome" => "failure").increment(1);
        }
        drop(stats);

        inner.config.listeners.emit(&FallbackEvent::Exhausted {
            service,
            at: Instant::now(),
            op_id,
            attempts: attempted.len(),
        });

        Err(FallbackError::Exhausted {
            attempts: attempted.len(),
            last: last_error.map(Box::new),
        })
    }

    /// Seeds the result cache, e.g. from a prior out-of-band success.
    pub async fn cache_put(&self, key: impl Into<String>, value: T) {
        let ttl = self.inner.config.cache_ttl;
        self.inner.cache.lock().await.insert(key.into(), value, ttl);
    }

    /// Removes expired cache entries; run this periodically.
    pub async fn sweep_cache(&self) -> usize {
        self.inner.cache.lock().await.sweep()
    }

    /// Drops all cached results.
    pub async fn clear_cache(&self) {
        self.inner.cache.lock().await.clear();
    }

    /// Per-strategy statistics plus queue and cache occupancy.
    pub async fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            strategies: self.inner.stats.lock().await.clone(),
            queue_depth: self.inner.queue.depth().await,
            cache_size: self.inner.cache.lock().await.len(),
        }
    }

    /// Stops the retry queue (pending continuations see their channel
    /// close) and drops the cache.
    pub async fn shutdown(&self) {
        self.inner.queue.shutdown().await;
        self.inner.cache.lock().await.clear();
        self.inner.config.listeners.emit(&FallbackEvent::Shutdown {
            service: "fallback".to_string(),
            at: Instant::now(),
        });
    }

    async fn run_strategy(
        &self,
        kind: StrategyKind,
        op: &Operation<T, E>,
        options: &OperationOptions,
    ) -> Result<T, FallbackError<E>> {
        match kind {
            StrategyKind::CacheFirst => self.cache_first(op, options).await,
            StrategyKind::CircuitBreaker => self.circuit_breaker(op, options).await,
            StrategyKind::RetryWithBackoff => self.retry_with_backoff(op, options).await,
            StrategyKind::GracefulDegradation => self.graceful_degradation(op, options).await,
            StrategyKind::CachedResponse => self.cached_response(op, options).await,
            StrategyKind::StaticFallback => self.static_fallback(op, options).await,
            StrategyKind::AlternativeService => self.alternative_service(op, options).await,
            StrategyKind::QueueAndRetry => self.queue_and_retry(op, options).await,
        }
    }

    /// Runs the operation once under the call deadline.
    async fn run_op(
        &self,
        op: &Operation<T, E>,
        options: &OperationOptions,
    ) -> Result<T, FallbackError<E>> {
        let deadline = options
            .timeout
            .unwrap_or(self.inner.config.default_timeout);
        match tokio::time::timeout(deadline, op(options.clone())).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(FallbackError::Application(err)),
            Err(_) => Err(FallbackError::Timeout { after: deadline }),
        }
    }

    fn cache_key(&self, options: &OperationOptions) -> String {
        options.cache_key.clone().unwrap_or_else(|| {
            format!(
                "{}:{}",
                options.service_name.as_deref().unwrap_or("operation"),
                match options.operation_type {
                    OperationType::Read => "read",
                    OperationType::Write => "write",
                    OperationType::Critical => "critical",
                    OperationType::Generic => "generic",
                }
            )
        })
    }

    async fn serve_from_cache(&self, key: &str, options: &OperationOptions) -> Option<T> {
        let value = self.inner.cache.lock().await.get(&key.to_string()).cloned();
        if value.is_some() {
            self.inner.config.listeners.emit(&FallbackEvent::CacheHit {
                service: source_name(options),
                at: Instant::now(),
                key: key.to_string(),
            });
        }
        value
    }

    async fn cache_first(
        &self,
        op: &Operation<T, E>,
        options: &OperationOptions,
    ) -> Result<T, FallbackError<E>> {
        let key = self.cache_key(options);
        if let Some(value) = self.serve_from_cache(&key, options).await {
            return Ok(value);
        }
        let value = self.run_op(op, options).await?;
        let ttl = self.inner.config.cache_ttl;
        self.inner.cache.lock().await.insert(key, value.clone(), ttl);
        Ok(value)
    }

    async fn circuit_breaker(
        &self,
        op: &Operation<T, E>,
        options: &OperationOptions,
    ) -> Result<T, FallbackError<E>> {
        let service = options
            .service_name
            .clone()
            .unwrap_or_else(|| "fallback-service".to_string());
        let failure_threshold = self.inner.config.breaker_failure_threshold;
        let call_timeout = options
            .timeout
            .unwrap_or(self.inner.config.default_timeout);

        let breaker = self
            .inner
            .registry
            .get(&service, || {
                BreakerConfig::builder()
                    .failure_threshold(failure_threshold)
                    .call_timeout(call_timeout)
                    .build()
            })
            .await;

        let op = Arc::clone(op);
        let call_options = options.clone();
        breaker
            .execute_with(
                move |_ctx| op(call_options.clone()),
                BreakerCallOptions {
                    timeout: Some(call_timeout),
                    cache_key: options.cache_key.clone(),
                },
            )
            .await
            .map_err(FallbackError::from)
    }

    async fn retry_with_backoff(
        &self,
        op: &Operation<T, E>,
        options: &OperationOptions,
    ) -> Result<T, FallbackError<E>> {
        let max_retries = options.max_retries.unwrap_or(self.inner.config.max_retries);
        let mut delay = options.retry_delay.unwrap_or(self.inner.config.retry_delay);
        let mut attempt: u32 = 0;

        loop {
            match self.run_op(op, options).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= max_retries {
                        return Err(err);
                    }
                    // Up to 10% jitter keeps synchronized callers from
                    // retrying in lockstep.
                    let jitter = delay.mul_f64(rand::random::<f64>() * 0.1);
                    let sleep_for = delay + jitter;

                    self.inner.config.listeners.emit(&FallbackEvent::RetryAttempt {
                        service: source_name(options),
                        at: Instant::now(),
                        attempt: attempt + 1,
                        delay: sleep_for,
                    });

                    tokio::time::sleep(sleep_for).await;
                    delay *= 2;
                    attempt += 1;
                }
            }
        }
    }

    async fn graceful_degradation(
        &self,
        op: &Operation<T, E>,
        options: &OperationOptions,
    ) -> Result<T, FallbackError<E>> {
        let mut full = options.clone();
        full.degraded = false;
        match self.run_op(op, &full).await {
            Ok(value) => Ok(value),
            Err(_full_error) => {
                let kept = strategy::reduce_features(&options.features);
                self.inner.config.listeners.emit(&FallbackEvent::Degraded {
                    service: source_name(options),
                    at: Instant::now(),
                    kept_features: kept.len(),
                });

                let mut degraded = options.clone();
                degraded.degraded = true;
                degraded.features = kept;
                // The degraded attempt's failure is the one surfaced.
                self.run_op(op, &degraded).await
            }
        }
    }

    async fn cached_response(
        &self,
        op: &Operation<T, E>,
        options: &OperationOptions,
    ) -> Result<T, FallbackError<E>> {
        let key = self.cache_key(options);
        if let Some(value) = self.serve_from_cache(&key, options).await {
            return Ok(value);
        }
        match self.run_op(op, options).await {
            Ok(value) => {
                let ttl = self.inner.config.cache_ttl;
                self.inner.cache.lock().await.insert(key, value.clone(), ttl);
                Ok(value)
            }
            Err(err) => match &self.inner.config.default_response {
                Some(factory) => Ok(factory(options)),
                None => Err(err),
            },
        }
    }

    async fn static_fallback(
        &self,
        op: &Operation<T, E>,
        options: &OperationOptions,
    ) -> Result<T, FallbackError<E>> {
        match self.run_op(op, options).await {
            Ok(value) => Ok(value),
            Err(err) => match &self.inner.config.static_response {
                Some(factory) => Ok(factory(options)),
                None => Err(err),
            },
        }
    }

    async fn alternative_service(
        &self,
        op: &Operation<T, E>,
        options: &OperationOptions,
    ) -> Result<T, FallbackError<E>> {
        match self.run_op(op, options).await {
            Ok(value) => Ok(value),
            Err(primary_error) => {
                for endpoint in &options.alternatives {
                    self.inner
                        .config
                        .listeners
                        .emit(&FallbackEvent::AlternativeAttempt {
                            service: source_name(options),
                            at: Instant::now(),
                            endpoint: endpoint.name.clone(),
                        });

                    let mut retargeted = options.clone();
                    retargeted.endpoint = Some(endpoint.clone());
                    if let Ok(value) = self.run_op(op, &retargeted).await {
                        self.inner
                            .config
                            .listeners
                            .emit(&FallbackEvent::AlternativeSuccess {
                                service: source_name(options),
                                at: Instant::now(),
                                endpoint: endpoint.name.clone(),
                            });
                        return Ok(value);
                    }
                }
                // Every alternative failed; the primary's error is the one
                // that matters to the caller.
                Err(primary_error)
            }
        }
    }

    async fn queue_and_retry(
        &self,
        op: &Operation<T, E>,
        options: &OperationOptions,
    ) -> Result<T, FallbackError<E>> {
        match self.run_op(op, options).await {
            Ok(value) => Ok(value),
            Err(_immediate) => {
                let service = source_name(options);
                let Some(rx) = self
                    .inner
                    .queue
                    .enqueue(Arc::clone(op), options.clone(), &service)
                    .await
                else {
                    return Err(FallbackError::QueueFull);
                };

                if options.immediate_ack {
                    if let Some(factory) = &self.inner.config.queued_response {
                        return Ok(factory(options));
                    }
                }

                match rx.await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(FallbackError::Application(err)),
                    Err(_closed) => Err(FallbackError::QueueClosed),
                }
            }
        }
    }
}

fn source_name(options: &OperationOptions) -> String {
    options
        .service_name
        .clone()
        .unwrap_or_else(|| "fallback".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, PartialEq)]
    struct Fail(&'static str);

    impl std::fmt::Display for Fail {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    fn orchestrator(config: FallbackConfig<String>) -> FallbackOrchestrator<String, Fail> {
        FallbackOrchestrator::new(config, Arc::new(BreakerRegistry::new()))
    }

    fn failing_op() -> Operation<String, Fail> {
        operation(|_opts| async { Err::<String, _>(Fail("down")) })
    }

    #[tokio::test]
    async fn first_succeeding_strategy_wins_and_stops_the_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let op: Operation<String, Fail> = operation(move |_opts| {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok("primary".to_string())
            }
        });

        let orch = orchestrator(
            FallbackConfig::builder()
                .strategies(vec![
                    StrategyKind::StaticFallback,
                    StrategyKind::RetryWithBackoff,
                ])
                .build(),
        );

        let value = orch
            .execute_with_fallback(op, OperationOptions::default())
            .await
            .unwrap();
        assert_eq!(value, "primary");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_strategy_falls_through_to_the_next() {
        let orch = orchestrator(
            FallbackConfig::builder()
                .strategies(vec![
                    StrategyKind::AlternativeService,
                    StrategyKind::StaticFallback,
                ])
                .static_response(|_opts| "placeholder".to_string())
                .build(),
        );

        let value = orch
            .execute_with_fallback(failing_op(), OperationOptions::default())
            .await
            .unwrap();
        assert_eq!(value, "placeholder");

        let stats = orch.stats().await;
        assert_eq!(stats.strategies[&StrategyKind::StaticFallback].successes, 1);
        assert_eq!(
            stats.strategies[&StrategyKind::AlternativeService].failures,
            1
        );
    }

    #[tokio::test]
    async fn exhaustion_surfaces_last_error_and_debits_all_attempted() {
        let orch = orchestrator(
            FallbackConfig::builder()
                .strategies(vec![
                    StrategyKind::AlternativeService,
                    StrategyKind::GracefulDegradation,
                ])
                .build(),
        );

        let err = orch
            .execute_with_fallback(failing_op(), OperationOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_exhausted());

        let stats = orch.stats().await;
        assert_eq!(
            stats.strategies[&StrategyKind::AlternativeService].failures,
            1
        );
        assert_eq!(
            stats.strategies[&StrategyKind::GracefulDegradation].failures,
            1
        );
    }

    #[tokio::test]
    async fn retry_with_backoff_retries_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let op: Operation<String, Fail> = operation(move |_opts| {
            let seen = Arc::clone(&seen);
            async move {
                if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Fail("transient"))
                } else {
                    Ok("third time".to_string())
                }
            }
        });

        let orch = orchestrator(
            FallbackConfig::builder()
                .strategies(vec![StrategyKind::RetryWithBackoff])
                .max_retries(3)
                .retry_delay(Duration::from_millis(5))
                .build(),
        );

        let value = orch
            .execute_with_fallback(op, OperationOptions::default())
            .await
            .unwrap();
        assert_eq!(value, "third time");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn graceful_degradation_retries_with_reduced_features() {
        let op: Operation<String, Fail> = operation(|opts| async move {
            if opts.degraded {
                Ok(format!("degraded:{}", opts.features.len()))
            } else {
                Err(Fail("full feature set too heavy"))
            }
        });

        let orch = orchestrator(
            FallbackConfig::builder()
                .strategies(vec![StrategyKind::GracefulDegradation])
                .build(),
        );

        let options = OperationOptions {
            features: vec![
                Feature::new("search", FeaturePriority::Essential),
                Feature::new("thumbnails", FeaturePriority::Optional),
                Feature::new("sorting", FeaturePriority::Important),
                Feature::new("export", FeaturePriority::NiceToHave),
            ],
            ..OperationOptions::default()
        };

        let value = orch.execute_with_fallback(op, options).await.unwrap();
        assert_eq!(value, "degraded:2");
    }

    #[tokio::test]
    async fn cached_response_serves_cache_after_manual_population() {
        let orch = orchestrator(
            FallbackConfig::builder()
                .strategies(vec![StrategyKind::CachedResponse])
                .build(),
        );
        let options = OperationOptions {
            cache_key: Some("loans".to_string()),
            ..OperationOptions::default()
        };

        // Cache empty: the operation's own error surfaces (wrapped).
        let err = orch
            .execute_with_fallback(failing_op(), options.clone())
            .await
            .unwrap_err();
        assert_eq!(err.into_application(), Some(Fail("down")));

        orch.cache_put("loans", "cached loans".to_string()).await;

        let value = orch
            .execute_with_fallback(failing_op(), options)
            .await
            .unwrap();
        assert_eq!(value, "cached loans");
    }

    #[tokio::test]
    async fn alternative_service_tries_each_endpoint() {
        let op: Operation<String, Fail> = operation(|opts| async move {
            match opts.endpoint {
                Some(ep) if ep.name == "backup-2" => Ok("served by backup-2".to_string()),
                _ => Err(Fail("primary down")),
            }
        });

        let orch = orchestrator(
            FallbackConfig::builder()
                .strategies(vec![StrategyKind::AlternativeService])
                .build(),
        );

        let options = OperationOptions {
            alternatives: vec![
                Endpoint::new("backup-1", "10.0.0.1"),
                Endpoint::new("backup-2", "10.0.0.2"),
            ],
            ..OperationOptions::default()
        };

        let value = orch.execute_with_fallback(op, options).await.unwrap();
        assert_eq!(value, "served by backup-2");
    }

    #[tokio::test]
    async fn queue_and_retry_resolves_the_pending_continuation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let op: Operation<String, Fail> = operation(move |_opts| {
            let seen = Arc::clone(&seen);
            async move {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Fail("first attempt fails"))
                } else {
                    Ok("queued success".to_string())
                }
            }
        });

        let orch = orchestrator(
            FallbackConfig::builder()
                .strategies(vec![StrategyKind::QueueAndRetry])
                .queue_retry_interval(Duration::from_millis(20))
                .build(),
        );

        let value = orch
            .execute_with_fallback(op, OperationOptions::default())
            .await
            .unwrap();
        assert_eq!(value, "queued success");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(orch.stats().await.queue_depth, 0);
    }

    #[tokio::test]
    async fn queue_and_retry_immediate_ack() {
        let orch = orchestrator(
            FallbackConfig::builder()
                .strategies(vec![StrategyKind::QueueAndRetry])
                .queue_retry_interval(Duration::from_secs(3600))
                .queued_response(|_opts| "queued for processing".to_string())
                .build(),
        );

        let options = OperationOptions {
            immediate_ack: true,
            ..OperationOptions::default()
        };

        let value = orch
            .execute_with_fallback(failing_op(), options)
            .await
            .unwrap();
        assert_eq!(value, "queued for processing");
        assert_eq!(orch.stats().await.queue_depth, 1);
    }

    #[tokio::test]
    async fn queue_gives_up_after_max_attempts() {
        let orch = orchestrator(
            FallbackConfig::builder()
                .strategies(vec![StrategyKind::QueueAndRetry])
                .queue_retry_interval(Duration::from_millis(10))
                .queue_max_attempts(2)
                .build(),
        );

        let err = orch
            .execute_with_fallback(failing_op(), OperationOptions::default())
            .await
            .unwrap_err();
        // The parked operation kept failing; its final error reaches the
        // continuation, wrapped in the exhausted chain error.
        assert_eq!(err.into_application(), Some(Fail("down")));
        assert_eq!(orch.stats().await.queue_depth, 0);
    }

    #[tokio::test]
    async fn circuit_breaker_strategy_maps_open_rejections() {
        let registry = Arc::new(BreakerRegistry::new());
        let orch: FallbackOrchestrator<String, Fail> = FallbackOrchestrator::new(
            FallbackConfig::builder()
                .strategies(vec![StrategyKind::CircuitBreaker])
                .breaker_failure_threshold(1)
                .build(),
            Arc::clone(&registry),
        );

        let options = OperationOptions {
            service_name: Some("directory".to_string()),
            ..OperationOptions::default()
        };

        // First call trips the breaker.
        let _ = orch
            .execute_with_fallback(failing_op(), options.clone())
            .await;
        // Second call is rejected by the open circuit.
        let err = orch
            .execute_with_fallback(failing_op(), options)
            .await
            .unwrap_err();
        assert!(matches!(
            err.last_error(),
            Some(FallbackError::CircuitOpen { .. })
        ));
    }
}
