//! Execute-style circuit breaker guarding calls to flaky dependencies.
//!
//! A breaker wraps an async operation: calls pass through while the circuit
//! is **closed**, are rejected while it is **open**, and probe for recovery
//! while it is **half-open**. Failure handling beyond the state machine is
//! pluggable ([`FallbackMode`]): fail fast, serve a cached response, or
//! rotate through alternative endpoints.
//!
//! ## State machine
//!
//! - **Closed**: every failure increments the failure counter, every success
//!   decrements it (floored at zero) so sparse failures decay instead of
//!   accumulating; at `failure_threshold` the circuit opens.
//! - **Open**: calls are rejected until `open_timeout` has elapsed; both an
//!   incoming call after the deadline and a background timer (so an idle
//!   breaker still recovers) promote the circuit to half-open.
//! - **Half-open**: successes accumulate toward `success_threshold`, which
//!   closes the circuit; a single failure reopens it, as does a watchdog
//!   timer if the threshold is not reached in time.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hostguard_breaker::{BreakerConfig, CircuitBreaker};
//! use futures::future::BoxFuture;
//!
//! # #[derive(Debug)] struct QueryError;
//! # async fn example() {
//! let breaker: CircuitBreaker<String> = CircuitBreaker::new(
//!     "directory-service",
//!     BreakerConfig::builder().failure_threshold(3).build(),
//! );
//!
//! let result = breaker
//!     .execute(|_ctx| -> BoxFuture<'static, Result<String, QueryError>> {
//!         Box::pin(async { Ok("directory reply".to_string()) })
//!     })
//!     .await;
//! # let _ = result;
//! # }
//! ```

mod config;
mod error;
mod events;
mod metrics;
mod registry;

pub use config::{
    BreakerConfig, BreakerConfigBuilder, CallOptions, Endpoint, FallbackMode,
};
pub use crate::metrics::MetricsSnapshot;
pub use error::BreakerError;
pub use events::BreakerEvent;
pub use registry::BreakerRegistry;

use crate::metrics::CallMetrics;
use futures::future::BoxFuture;
use hostguard_core::TtlCache;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// Calls pass through.
    Closed = 0,
    /// Calls are rejected.
    Open = 1,
    /// Recovery is being probed.
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Lowercase label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Context handed to every operation invocation.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Identifier unique within this breaker's lifetime.
    pub request_id: u64,
    /// Service the breaker guards.
    pub service: String,
    /// Circuit state when the call was admitted.
    pub state: CircuitState,
    /// Set when the call is being retargeted at an alternative endpoint.
    pub endpoint: Option<Endpoint>,
}

/// Point-in-time view of the state machine's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateInfo {
    pub state: CircuitState,
    /// Time since the last state change.
    pub since: Duration,
    pub failure_count: u32,
    pub success_count: u32,
    /// Calls admitted over the breaker's lifetime.
    pub request_count: u64,
}

struct Machine {
    state: CircuitState,
    changed_at: Instant,
    /// Bumped on every transition; timers compare it so a stale timer from
    /// a previous episode can never fire into a newer one.
    generation: u64,
    failure_count: u32,
    success_count: u32,
    request_count: u64,
    alt_index: usize,
    timer: Option<JoinHandle<()>>,
}

struct Shared<T> {
    service: String,
    config: BreakerConfig,
    machine: Mutex<Machine>,
    state_atomic: AtomicU8,
    cache: Mutex<TtlCache<String, T>>,
    metrics: Mutex<CallMetrics>,
    request_seq: AtomicU64,
}

/// A circuit breaker for operations returning `T`.
///
/// Cloning is cheap and shares all state; the registry hands out clones of
/// one instance per service name.
pub struct CircuitBreaker<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for CircuitBreaker<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> CircuitBreaker<T>
where
    T: Clone + Send + 'static,
{
    /// Creates a breaker guarding the named service.
    pub fn new(service: impl Into<String>, config: BreakerConfig) -> Self {
        let cache_capacity = config.cache_capacity;
        Self {
            shared: Arc::new(Shared {
                service: service.into(),
                machine: Mutex::new(Machine {
                    state: CircuitState::Closed,
                    changed_at: Instant::now(),
                    generation: 0,
                    failure_count: 0,
                    success_count: 0,
                    request_count: 0,
                    alt_index: 0,
                    timer: None,
                }),
                state_atomic: AtomicU8::new(CircuitState::Closed as u8),
                cache: Mutex::new(TtlCache::new(cache_capacity)),
                metrics: Mutex::new(CallMetrics::default()),
                request_seq: AtomicU64::new(0),
                config,
            }),
        }
    }

    /// Service name this breaker guards.
    pub fn service(&self) -> &str {
        &self.shared.service
    }

    /// Current state, readable without awaiting.
    pub fn current_state(&self) -> CircuitState {
        CircuitState::from_u8(self.shared.state_atomic.load(Ordering::Acquire))
    }

    /// Executes `operation` with default [`CallOptions`].
    pub async fn execute<E, F>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: Fn(CallContext) -> BoxFuture<'static, Result<T, E>> + Send + Sync,
    {
        self.execute_with(operation, CallOptions::default()).await
    }

    /// Executes `operation` under the circuit breaker.
    ///
    /// The operation may be invoked more than once (alternative-endpoint
    /// fallback re-runs it with a retargeted [`CallContext`]). Only the
    /// final error after fallback handling is surfaced.
    pub async fn execute_with<E, F>(
        &self,
        operation: F,
        options: CallOptions,
    ) -> Result<T, BreakerError<E>>
    where
        F: Fn(CallContext) -> BoxFuture<'static, Result<T, E>> + Send + Sync,
    {
        let shared = &self.shared;

        let Some(admitted_state) = self.acquire().await else {
            shared.metrics.lock().await.record_rejection();
            shared.config.listeners.emit(&BreakerEvent::CallRejected {
                service: shared.service.clone(),
                at: Instant::now(),
            });
            #[cfg(feature = "tracing")]
            tracing::debug!(service = %shared.service, "call rejected, circuit open");
            return Err(BreakerError::Open {
                service: shared.service.clone(),
            });
        };

        shared.metrics.lock().await.record_request(admitted_state);

        let ctx = CallContext {
            request_id: shared.request_seq.fetch_add(1, Ordering::Relaxed),
            service: shared.service.clone(),
            state: admitted_state,
            endpoint: None,
        };

        let deadline = options.timeout.unwrap_or(shared.config.call_timeout);
        let started = Instant::now();

        match tokio::time::timeout(deadline, operation(ctx.clone())).await {
            Ok(Ok(value)) => {
                self.record_success(started.elapsed()).await;
                if let Some(key) = &options.cache_key {
                    self.shared.cache.lock().await.insert(
                        key.clone(),
                        value.clone(),
                        shared.config.cache_ttl,
                    );
                }
                Ok(value)
            }
            Ok(Err(err)) => {
                self.record_failure(started.elapsed(), false).await;
                self.handle_failure(&operation, &options, ctx.request_id, BreakerError::Inner(err))
                    .await
            }
            Err(_) => {
                self.record_failure(started.elapsed(), true).await;
                self.handle_failure(
                    &operation,
                    &options,
                    ctx.request_id,
                    BreakerError::Timeout { after: deadline },
                )
                .await
            }
        }
    }

    /// Stores a response for the cached-response fallback.
    pub async fn cache_put(&self, key: impl Into<String>, value: T) {
        let ttl = self.shared.config.cache_ttl;
        self.shared.cache.lock().await.insert(key.into(), value, ttl);
    }

    /// Drops all cached fallback responses.
    pub async fn clear_cache(&self) {
        self.shared.cache.lock().await.clear();
    }

    /// Removes expired fallback-cache entries.
    pub async fn sweep_cache(&self) -> usize {
        self.shared.cache.lock().await.sweep()
    }

    /// Accumulated call metrics.
    pub async fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.lock().await.snapshot(self.current_state())
    }

    /// Resets accumulated metrics to zero.
    pub async fn reset_metrics(&self) {
        self.shared.metrics.lock().await.reset();
        self.shared.config.listeners.emit(&BreakerEvent::MetricsReset {
            service: self.shared.service.clone(),
            at: Instant::now(),
        });
    }

    /// State-machine bookkeeping at a point in time.
    pub async fn state_info(&self) -> StateInfo {
        let st = self.shared.machine.lock().await;
        StateInfo {
            state: st.state,
            since: st.changed_at.elapsed(),
            failure_count: st.failure_count,
            success_count: st.success_count,
            request_count: st.request_count,
        }
    }

    /// Manually opens the circuit.
    pub async fn force_open(&self) {
        let mut st = self.shared.machine.lock().await;
        Shared::transition(&self.shared, &mut st, CircuitState::Open, "forced open");
    }

    /// Manually closes the circuit and resets its counters.
    pub async fn force_closed(&self) {
        let mut st = self.shared.machine.lock().await;
        Shared::transition(&self.shared, &mut st, CircuitState::Closed, "forced closed");
    }

    /// Stops the breaker: aborts recovery timers and drops cached responses.
    pub async fn shutdown(&self) {
        {
            let mut st = self.shared.machine.lock().await;
            if let Some(timer) = st.timer.take() {
                timer.abort();
            }
        }
        self.shared.cache.lock().await.clear();
        self.shared.config.listeners.emit(&BreakerEvent::Shutdown {
            service: self.shared.service.clone(),
            at: Instant::now(),
        });
    }

    /// Admits or rejects a call, promoting an expired open circuit first.
    async fn acquire(&self) -> Option<CircuitState> {
        let mut st = self.shared.machine.lock().await;
        match st.state {
            CircuitState::Closed | CircuitState::HalfOpen => {
                st.request_count += 1;
                Some(st.state)
            }
            CircuitState::Open => {
                if st.changed_at.elapsed() >= self.shared.config.open_timeout {
                    Shared::transition(
                        &self.shared,
                        &mut st,
                        CircuitState::HalfOpen,
                        "open timeout elapsed",
                    );
                    st.request_count += 1;
                    Some(st.state)
                } else {
                    None
                }
            }
        }
    }

    async fn record_success(&self, duration: Duration) {
        let shared = &self.shared;
        let mut st = shared.machine.lock().await;
        match st.state {
            CircuitState::HalfOpen => {
                st.success_count += 1;
                if st.success_count >= shared.config.success_threshold {
                    Shared::transition(
                        shared,
                        &mut st,
                        CircuitState::Closed,
                        "success threshold reached",
                    );
                }
            }
            CircuitState::Closed => {
                // Decay, not reset: one success forgives one failure.
                st.failure_count = st.failure_count.saturating_sub(1);
            }
            // A call admitted before the circuit opened may finish late.
            CircuitState::Open => {}
        }
        let state = st.state;
        shared.config.listeners.emit(&BreakerEvent::Success {
            service: shared.service.clone(),
            at: Instant::now(),
            state,
            duration,
        });
        drop(st);

        shared.metrics.lock().await.record_success(duration);

        #[cfg(feature = "metrics")]
        {
            ::metrics::counter!("breaker_calls_total", "service" => shared.service.clone(), "outcome" => "success").increment(1);
            ::metrics::histogram!("breaker_call_duration_seconds", "service" => shared.service.clone())
                .record(duration.as_secs_f64());
        }
    }

    async fn record_failure(&self, duration: Duration, timed_out: bool) {
        let shared = &self.shared;
        let mut st = shared.machine.lock().await;
        st.failure_count += 1;
        match st.state {
            CircuitState::HalfOpen => {
                Shared::transition(shared, &mut st, CircuitState::Open, "failure in half-open");
            }
            CircuitState::Closed => {
                if st.failure_count >= shared.config.failure_threshold {
                    Shared::transition(
                        shared,
                        &mut st,
                        CircuitState::Open,
                        "failure threshold exceeded",
                    );
                }
            }
            CircuitState::Open => {}
        }
        let failure_count = st.failure_count;
        let state = st.state;
        shared.config.listeners.emit(&BreakerEvent::Failure {
            service: shared.service.clone(),
            at: Instant::now(),
            state,
            failure_count,
            timed_out,
        });
        drop(st);

        shared.metrics.lock().await.record_failure(duration, timed_out);

        #[cfg(feature = "metrics")]
        {
            ::metrics::counter!("breaker_calls_total", "service" => shared.service.clone(), "outcome" => "failure").increment(1);
            ::metrics::histogram!("breaker_call_duration_seconds", "service" => shared.service.clone())
                .record(duration.as_secs_f64());
        }
    }

    async fn handle_failure<E, F>(
        &self,
        operation: &F,
        options: &CallOptions,
        request_id: u64,
        original: BreakerError<E>,
    ) -> Result<T, BreakerError<E>>
    where
        F: Fn(CallContext) -> BoxFuture<'static, Result<T, E>> + Send + Sync,
    {
        let shared = &self.shared;
        match shared.config.fallback {
            FallbackMode::FailFast => Err(original),
            FallbackMode::CachedResponse => {
                let key = options
                    .cache_key
                    .clone()
                    .unwrap_or_else(|| shared.service.clone());
                let mut cache = shared.cache.lock().await;
                if let Some(value) = cache.get(&key) {
                    let value = value.clone();
                    drop(cache);
                    shared.config.listeners.emit(&BreakerEvent::FallbackCacheHit {
                        service: shared.service.clone(),
                        at: Instant::now(),
                        key,
                    });
                    Ok(value)
                } else {
                    drop(cache);
                    shared
                        .config
                        .listeners
                        .emit(&BreakerEvent::FallbackCacheMiss {
                            service: shared.service.clone(),
                            at: Instant::now(),
                            key,
                        });
                    Err(original)
                }
            }
            FallbackMode::AlternativeService => {
                self.try_alternatives(operation, request_id, original).await
            }
        }
    }

    /// Tries each alternative endpoint in rotation order, starting from the
    /// one that last succeeded. The rotation pointer advances only on
    /// success; alternative outcomes never feed the state machine.
    async fn try_alternatives<E, F>(
        &self,
        operation: &F,
        request_id: u64,
        original: BreakerError<E>,
    ) -> Result<T, BreakerError<E>>
    where
        F: Fn(CallContext) -> BoxFuture<'static, Result<T, E>> + Send + Sync,
    {
        let shared = &self.shared;
        let alternatives = &shared.config.alternatives;
        if alternatives.is_empty() {
            return Err(original);
        }

        let start = shared.machine.lock().await.alt_index;
        for offset in 0..alternatives.len() {
            let idx = (start + offset) % alternatives.len();
            let endpoint = alternatives[idx].clone();

            shared
                .config
                .listeners
                .emit(&BreakerEvent::AlternativeAttempt {
                    service: shared.service.clone(),
                    at: Instant::now(),
                    endpoint: endpoint.name.clone(),
                });

            let deadline = endpoint.timeout.unwrap_or(shared.config.call_timeout);
            let ctx = CallContext {
                request_id,
                service: shared.service.clone(),
                state: self.current_state(),
                endpoint: Some(endpoint.clone()),
            };

            if let Ok(Ok(value)) = tokio::time::timeout(deadline, operation(ctx)).await {
                shared.machine.lock().await.alt_index = idx;
                shared
                    .config
                    .listeners
                    .emit(&BreakerEvent::AlternativeSuccess {
                        service: shared.service.clone(),
                        at: Instant::now(),
                        endpoint: endpoint.name,
                    });
                return Ok(value);
            }
        }

        shared
            .config
            .listeners
            .emit(&BreakerEvent::AlternativesExhausted {
                service: shared.service.clone(),
                at: Instant::now(),
            });
        Err(original)
    }
}

impl<T> Shared<T>
where
    T: Clone + Send + 'static,
{
    /// State transitions happen only here, under the machine lock, so two
    /// concurrent failures can never race past the threshold comparison.
    fn transition(
        shared: &Arc<Shared<T>>,
        st: &mut Machine,
        to: CircuitState,
        reason: &'static str,
    ) {
        if st.state == to {
            return;
        }
        let from = st.state;

        st.state = to;
        st.changed_at = Instant::now();
        st.generation += 1;
        shared.state_atomic.store(to as u8, Ordering::Release);

        match to {
            CircuitState::Closed => {
                st.failure_count = 0;
                st.success_count = 0;
            }
            // Each open or half-open episode counts successes from scratch.
            CircuitState::Open | CircuitState::HalfOpen => st.success_count = 0,
        }

        if let Some(timer) = st.timer.take() {
            timer.abort();
        }
        match to {
            CircuitState::Open => Self::arm_timer(
                shared,
                st,
                CircuitState::Open,
                CircuitState::HalfOpen,
                "open timeout elapsed",
            ),
            CircuitState::HalfOpen => Self::arm_timer(
                shared,
                st,
                CircuitState::HalfOpen,
                CircuitState::Open,
                "half-open timed out",
            ),
            CircuitState::Closed => {}
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            service = %shared.service,
            from = from.as_str(),
            to = to.as_str(),
            reason,
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            ::metrics::counter!(
                "breaker_transitions_total",
                "service" => shared.service.clone(),
                "from" => from.as_str(),
                "to" => to.as_str()
            )
            .increment(1);
            ::metrics::gauge!("breaker_state", "service" => shared.service.clone())
                .set(to as u8 as f64);
        }

        shared.config.listeners.emit(&BreakerEvent::StateTransition {
            service: shared.service.clone(),
            at: Instant::now(),
            from,
            to,
            failure_count: st.failure_count,
            success_count: st.success_count,
            reason,
        });
    }

    /// Arms the eager recovery timer: `open_timeout` from now, if the state
    /// and generation are unchanged, move `expect` → `next`. Without a
    /// runtime no timer is armed; the lazy elapsed check in `acquire` still
    /// recovers the circuit.
    fn arm_timer(
        shared: &Arc<Shared<T>>,
        st: &mut Machine,
        expect: CircuitState,
        next: CircuitState,
        reason: &'static str,
    ) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let weak = Arc::downgrade(shared);
        let generation = st.generation;
        let delay = shared.config.open_timeout;
        st.timer = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                let mut st = shared.machine.lock().await;
                if st.generation == generation && st.state == expect {
                    Shared::transition(&shared, &mut st, next, reason);
                }
            }
        }));
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        if let Some(timer) = self.machine.get_mut().timer.take() {
            timer.abort();
        }
    }
}
