//! Strategy identities, selection order, and feature reduction.

/// The named fallback strategies, in default priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Serve from cache if fresh, else run and populate.
    CacheFirst,
    /// Delegate to a named circuit breaker from the registry.
    CircuitBreaker,
    /// Re-run with exponential backoff and jitter.
    RetryWithBackoff,
    /// Retry once with a reduced feature set.
    GracefulDegradation,
    /// Cache-first, but a miss-and-failure yields a default response.
    CachedResponse,
    /// Any failure yields a fixed placeholder response.
    StaticFallback,
    /// Try the primary target, then each configured alternative.
    AlternativeService,
    /// Attempt now; on failure park the operation for background retries.
    QueueAndRetry,
}

impl StrategyKind {
    /// Stable name used in events and stats.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CacheFirst => "cache_first",
            Self::CircuitBreaker => "circuit_breaker",
            Self::RetryWithBackoff => "retry_with_backoff",
            Self::GracefulDegradation => "graceful_degradation",
            Self::CachedResponse => "cached_response",
            Self::StaticFallback => "static_fallback",
            Self::AlternativeService => "alternative_service",
            Self::QueueAndRetry => "queue_and_retry",
        }
    }

    fn priority(&self) -> u8 {
        match self {
            Self::CacheFirst => 1,
            Self::CircuitBreaker => 2,
            Self::RetryWithBackoff => 3,
            Self::GracefulDegradation => 4,
            Self::CachedResponse => 5,
            Self::StaticFallback => 6,
            Self::AlternativeService => 7,
            Self::QueueAndRetry => 8,
        }
    }
}

/// All strategies in default priority order.
pub fn default_strategies() -> Vec<StrategyKind> {
    vec![
        StrategyKind::CacheFirst,
        StrategyKind::CircuitBreaker,
        StrategyKind::RetryWithBackoff,
        StrategyKind::GracefulDegradation,
        StrategyKind::CachedResponse,
        StrategyKind::StaticFallback,
        StrategyKind::AlternativeService,
        StrategyKind::QueueAndRetry,
    ]
}

/// How the caller characterizes the operation; biases strategy order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationType {
    /// Cache-serving strategies move to the front.
    Read,
    /// Retry moves to the front.
    Write,
    /// The circuit breaker moves to the front.
    Critical,
    /// Default priority order.
    #[default]
    Generic,
}

/// A feature of the operation, droppable under degradation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    /// Feature name the operation understands.
    pub name: String,
    /// How reluctant degradation is to drop it.
    pub priority: FeaturePriority,
}

impl Feature {
    pub fn new(name: impl Into<String>, priority: FeaturePriority) -> Self {
        Self {
            name: name.into(),
            priority,
        }
    }
}

/// Drop order for graceful degradation; `Essential` goes last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FeaturePriority {
    Essential,
    Important,
    NiceToHave,
    Optional,
}

/// Orders the enabled strategies for one call.
///
/// Caller preference filters the enabled set (keeping the enabled order);
/// otherwise the operation type pulls its favored strategies to the front
/// of the default priority order.
pub(crate) fn select(
    enabled: &[StrategyKind],
    preferred: Option<&[StrategyKind]>,
    operation_type: OperationType,
) -> Vec<StrategyKind> {
    if let Some(preferred) = preferred {
        return enabled
            .iter()
            .copied()
            .filter(|s| preferred.contains(s))
            .collect();
    }

    let favored = |s: StrategyKind| match operation_type {
        OperationType::Read => {
            matches!(s, StrategyKind::CacheFirst | StrategyKind::CachedResponse)
        }
        OperationType::Write => matches!(s, StrategyKind::RetryWithBackoff),
        OperationType::Critical => matches!(s, StrategyKind::CircuitBreaker),
        OperationType::Generic => false,
    };

    let mut ordered: Vec<StrategyKind> = enabled.to_vec();
    ordered.sort_by_key(|s| (!favored(*s), s.priority()));
    ordered
}

/// Keeps the most important half of the feature set (rounded up).
pub(crate) fn reduce_features(features: &[Feature]) -> Vec<Feature> {
    let mut sorted = features.to_vec();
    sorted.sort_by_key(|f| f.priority);
    sorted.truncate(features.len().div_ceil(2));
    sorted
}
