//! Per-breaker call metrics.

use crate::CircuitState;
use std::time::Duration;

/// Smoothing factor for the rolling average response time.
const ALPHA: f64 = 0.1;

/// Monotonically accumulating call counters, reset only explicitly.
#[derive(Debug, Default)]
pub(crate) struct CallMetrics {
    requests: u64,
    successes: u64,
    failures: u64,
    timeouts: u64,
    rejections: u64,
    average_ms: f64,
    min_ms: Option<f64>,
    max_ms: f64,
    requests_closed: u64,
    requests_open: u64,
    requests_half_open: u64,
}

impl CallMetrics {
    pub(crate) fn record_request(&mut self, state: CircuitState) {
        self.requests += 1;
        match state {
            CircuitState::Closed => self.requests_closed += 1,
            CircuitState::Open => self.requests_open += 1,
            CircuitState::HalfOpen => self.requests_half_open += 1,
        }
    }

    pub(crate) fn record_success(&mut self, duration: Duration) {
        self.successes += 1;
        self.record_response_time(duration);
    }

    pub(crate) fn record_failure(&mut self, duration: Duration, timed_out: bool) {
        self.failures += 1;
        if timed_out {
            self.timeouts += 1;
        }
        self.record_response_time(duration);
    }

    pub(crate) fn record_rejection(&mut self) {
        self.rejections += 1;
    }

    /// Exponential smoothing keeps the average cheap to maintain and biased
    /// toward recent behavior.
    fn record_response_time(&mut self, duration: Duration) {
        let ms = duration.as_secs_f64() * 1000.0;
        self.average_ms = if self.average_ms == 0.0 {
            ms
        } else {
            self.average_ms * (1.0 - ALPHA) + ms * ALPHA
        };
        self.min_ms = Some(self.min_ms.map_or(ms, |m| m.min(ms)));
        self.max_ms = self.max_ms.max(ms);
    }

    pub(crate) fn reset(&mut self) {
        *self = CallMetrics::default();
    }

    pub(crate) fn snapshot(&self, state: CircuitState) -> MetricsSnapshot {
        let total = self.requests;
        let rate = |n: u64| if total > 0 { n as f64 / total as f64 } else { 0.0 };
        MetricsSnapshot {
            state,
            requests: self.requests,
            successes: self.successes,
            failures: self.failures,
            timeouts: self.timeouts,
            rejections: self.rejections,
            success_rate: rate(self.successes),
            failure_rate: rate(self.failures),
            timeout_rate: rate(self.timeouts),
            average_response: Duration::from_secs_f64(self.average_ms / 1000.0),
            min_response: Duration::from_secs_f64(self.min_ms.unwrap_or(0.0) / 1000.0),
            max_response: Duration::from_secs_f64(self.max_ms / 1000.0),
            requests_closed: self.requests_closed,
            requests_open: self.requests_open,
            requests_half_open: self.requests_half_open,
        }
    }
}

/// Point-in-time view of a breaker's accumulated metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    /// State at snapshot time.
    pub state: CircuitState,
    /// Calls that reached the breaker (rejections excluded).
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    /// Failures that were deadline expiries, tracked separately.
    pub timeouts: u64,
    /// Calls refused while open.
    pub rejections: u64,
    pub success_rate: f64,
    pub failure_rate: f64,
    pub timeout_rate: f64,
    /// Exponentially smoothed response time.
    pub average_response: Duration,
    pub min_response: Duration,
    pub max_response: Duration,
    pub requests_closed: u64,
    pub requests_open: u64,
    pub requests_half_open: u64,
}
