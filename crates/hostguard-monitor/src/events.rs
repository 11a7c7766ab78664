//! Events emitted by the monitor.

use crate::alerts::Alert;
use hostguard_core::Event;
use std::time::Instant;

/// Observable outcomes of monitoring passes.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// One pass raised alerts for a host; all of that host's alerts for
    /// the pass are batched here.
    HostAlerts {
        host: String,
        at: Instant,
        alerts: Vec<Alert>,
    },

    /// A full pass over the configured hosts finished.
    PassCompleted {
        at: Instant,
        hosts_checked: usize,
        hosts_succeeded: usize,
        /// Alerts raised during this pass.
        alerts: usize,
    },

    /// The configuration (or just its thresholds) was replaced.
    ConfigUpdated { at: Instant },
}

impl Event for MonitorEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::HostAlerts { .. } => "host_alerts",
            Self::PassCompleted { .. } => "pass_completed",
            Self::ConfigUpdated { .. } => "config_updated",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::HostAlerts { at, .. }
            | Self::PassCompleted { at, .. }
            | Self::ConfigUpdated { at, .. } => *at,
        }
    }

    fn source(&self) -> &str {
        match self {
            Self::HostAlerts { host, .. } => host,
            Self::PassCompleted { .. } | Self::ConfigUpdated { .. } => "monitor",
        }
    }
}
