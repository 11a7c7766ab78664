//! Monitor configuration.
//!
//! The configuration is an immutable value: the monitor holds it behind an
//! `Arc` and reconfiguration replaces the whole pointer in one assignment —
//! there is no field-by-field merging at arbitrary times.

use crate::alerts::AlertThresholds;
use std::time::Duration;

/// Configuration for a [`Monitor`](crate::Monitor).
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Hosts to poll every pass. An empty list makes each pass a no-op.
    pub hosts: Vec<String>,
    /// Time between passes.
    pub period: Duration,
    /// Alert boundaries evaluated against every successful collection.
    pub thresholds: AlertThresholds,
    /// How many alerts the bounded history retains.
    pub alert_history_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            period: Duration::from_secs(60),
            thresholds: AlertThresholds::default(),
            alert_history_capacity: 100,
        }
    }
}
