use futures::future::BoxFuture;
use hostguard_breaker::{
    BreakerConfig, BreakerEvent, BreakerRegistry, CallContext, CallOptions, CircuitBreaker,
    CircuitState, Endpoint, FallbackMode,
};
use hostguard_core::FnListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, PartialEq)]
struct Unavailable;

fn failing(_ctx: CallContext) -> BoxFuture<'static, Result<String, Unavailable>> {
    Box::pin(async { Err(Unavailable) })
}

/// A successful keyed call populates the fallback cache; a later failure
/// under the same key is served from it.
#[tokio::test]
async fn keyed_success_feeds_the_cached_response_fallback() {
    let breaker: CircuitBreaker<String> = CircuitBreaker::new(
        "loans",
        BreakerConfig::builder()
            .failure_threshold(100)
            .fallback(FallbackMode::CachedResponse)
            .build(),
    );
    let options = CallOptions {
        cache_key: Some("loans:list".to_string()),
        ..CallOptions::default()
    };

    let value = breaker
        .execute_with(
            |_ctx| -> BoxFuture<'static, Result<String, Unavailable>> {
                Box::pin(async { Ok("live loans".to_string()) })
            },
            options.clone(),
        )
        .await
        .unwrap();
    assert_eq!(value, "live loans");

    let fallback = breaker.execute_with(failing, options).await.unwrap();
    assert_eq!(fallback, "live loans");
}

/// A cache miss surfaces the operation's original error, not a cache error.
#[tokio::test]
async fn cached_response_miss_keeps_the_original_error() {
    let breaker: CircuitBreaker<String> = CircuitBreaker::new(
        "loans",
        BreakerConfig::builder()
            .failure_threshold(100)
            .fallback(FallbackMode::CachedResponse)
            .build(),
    );

    let err = breaker.execute(failing).await.unwrap_err();
    assert_eq!(err.into_inner(), Some(Unavailable));
}

/// Exhausting every alternative endpoint surfaces the primary error.
#[tokio::test]
async fn alternative_exhaustion_surfaces_primary_error() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&attempts);

    let breaker: CircuitBreaker<String> = CircuitBreaker::new(
        "directory",
        BreakerConfig::builder()
            .failure_threshold(100)
            .fallback(FallbackMode::AlternativeService)
            .alternative(Endpoint::new("backup-1", "10.0.0.1"))
            .alternative(Endpoint::new("backup-2", "10.0.0.2"))
            .listener(FnListener::new(move |event: &BreakerEvent| {
                if matches!(event, BreakerEvent::AlternativeAttempt { .. }) {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
            }))
            .build(),
    );

    let err = breaker.execute(failing).await.unwrap_err();
    assert_eq!(err.into_inner(), Some(Unavailable));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

/// Per-endpoint timeouts bound each alternative attempt.
#[tokio::test]
async fn slow_alternative_is_cut_off_by_its_own_timeout() {
    let mut slow = Endpoint::new("slow-backup", "10.0.0.9");
    slow.timeout = Some(Duration::from_millis(20));

    let breaker: CircuitBreaker<String> = CircuitBreaker::new(
        "directory",
        BreakerConfig::builder()
            .failure_threshold(100)
            .fallback(FallbackMode::AlternativeService)
            .alternative(slow)
            .build(),
    );

    let op = |ctx: CallContext| -> BoxFuture<'static, Result<String, Unavailable>> {
        Box::pin(async move {
            if ctx.endpoint.is_some() {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("too late".to_string())
            } else {
                Err(Unavailable)
            }
        })
    };

    let started = std::time::Instant::now();
    let err = breaker.execute(op).await.unwrap_err();
    assert_eq!(err.into_inner(), Some(Unavailable));
    assert!(started.elapsed() < Duration::from_secs(1));
}

/// The registry keeps one breaker per name, ignores later options, and
/// forwards breaker events to its own listeners.
#[tokio::test]
async fn registry_is_first_writer_wins_and_forwards_events() {
    let registry: BreakerRegistry<String> = BreakerRegistry::new();

    let transitions = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&transitions);
    registry.add_listener(FnListener::new(move |event: &BreakerEvent| {
        if matches!(event, BreakerEvent::StateTransition { .. }) {
            seen.fetch_add(1, Ordering::SeqCst);
        }
    }));

    let first = registry
        .get("ldap", || {
            BreakerConfig::builder().failure_threshold(1).build()
        })
        .await;
    let second = registry
        .get("ldap", || {
            BreakerConfig::builder().failure_threshold(50).build()
        })
        .await;

    // The first configuration is in force: one failure opens the circuit.
    let _ = second.execute(failing).await;
    assert_eq!(first.current_state(), CircuitState::Open);
    assert_eq!(transitions.load(Ordering::SeqCst), 1);

    assert!(registry.remove("ldap").await);
    assert!(registry.states().await.is_empty());
}
