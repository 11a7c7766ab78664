//! Durable per-strategy statistics.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Smoothing factor for the rolling average duration.
const ALPHA: f64 = 0.1;

/// Accumulated outcomes of one strategy, living for the orchestrator's
/// lifetime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyStats {
    pub total: u64,
    pub successes: u64,
    pub failures: u64,
    /// Exponentially smoothed duration of winning attempts.
    pub average_duration: Duration,
    /// Last time this strategy was attributed an outcome.
    pub last_used: Option<DateTime<Utc>>,
}

impl StrategyStats {
    pub(crate) fn record_success(&mut self, duration: Duration) {
        self.total += 1;
        self.successes += 1;
        self.last_used = Some(Utc::now());
        self.average_duration = if self.average_duration.is_zero() {
            duration
        } else {
            self.average_duration.mul_f64(1.0 - ALPHA) + duration.mul_f64(ALPHA)
        };
    }

    pub(crate) fn record_failure(&mut self) {
        self.total += 1;
        self.failures += 1;
        self.last_used = Some(Utc::now());
    }

    /// Fraction of outcomes that were successes.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successes as f64 / self.total as f64
        }
    }
}
