//! Alert thresholds, evaluation, and the bounded history.

use chrono::{DateTime, Utc};
use hostguard_collector::HostStats;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// How urgent an alert is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// Which metric tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    Cpu,
    Memory,
    Disk,
    Reachability,
    SessionCount,
}

/// One threshold violation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub host: String,
    pub at: DateTime<Utc>,
    pub severity: AlertSeverity,
    pub kind: AlertKind,
    pub message: String,
    /// Observed value of the metric.
    pub value: f64,
    /// Threshold it was compared against.
    pub threshold: f64,
    /// Volume label for disk alerts.
    pub volume: Option<String>,
}

/// Numeric boundaries the monitor evaluates every pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// CPU percentage above which a warning is raised.
    pub cpu_percent: f64,
    /// Memory used-percentage above which a warning is raised.
    pub memory_percent: f64,
    /// Absolute free space below which a volume is critical; below twice
    /// this it is a warning.
    pub disk_free_gb: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            cpu_percent: 90.0,
            memory_percent: 85.0,
            disk_free_gb: 5.0,
        }
    }
}

/// Evaluates one host's stats against the thresholds.
pub fn evaluate(host: &str, stats: &HostStats, thresholds: &AlertThresholds) -> Vec<Alert> {
    let now = Utc::now();
    let mut alerts = Vec::new();

    if stats.cpu_percent > thresholds.cpu_percent {
        alerts.push(Alert {
            host: host.to_string(),
            at: now,
            severity: AlertSeverity::Warning,
            kind: AlertKind::Cpu,
            message: format!(
                "CPU high: {:.1}% (threshold {:.1}%)",
                stats.cpu_percent, thresholds.cpu_percent
            ),
            value: stats.cpu_percent,
            threshold: thresholds.cpu_percent,
            volume: None,
        });
    }

    if stats.memory.used_percent > thresholds.memory_percent {
        alerts.push(Alert {
            host: host.to_string(),
            at: now,
            severity: AlertSeverity::Warning,
            kind: AlertKind::Memory,
            message: format!(
                "Memory high: {:.1}% ({:.1} GB / {:.1} GB)",
                stats.memory.used_percent, stats.memory.used_gb, stats.memory.total_gb
            ),
            value: stats.memory.used_percent,
            threshold: thresholds.memory_percent,
            volume: None,
        });
    }

    for disk in &stats.disks {
        if disk.free_gb < thresholds.disk_free_gb {
            alerts.push(Alert {
                host: host.to_string(),
                at: now,
                severity: AlertSeverity::Critical,
                kind: AlertKind::Disk,
                message: format!(
                    "Disk space critical on {}: {:.1} GB free (threshold {:.1} GB)",
                    disk.volume, disk.free_gb, thresholds.disk_free_gb
                ),
                value: disk.free_gb,
                threshold: thresholds.disk_free_gb,
                volume: Some(disk.volume.clone()),
            });
        } else if disk.free_gb < thresholds.disk_free_gb * 2.0 {
            alerts.push(Alert {
                host: host.to_string(),
                at: now,
                severity: AlertSeverity::Warning,
                kind: AlertKind::Disk,
                message: format!("Disk space low on {}: {:.1} GB free", disk.volume, disk.free_gb),
                value: disk.free_gb,
                threshold: thresholds.disk_free_gb * 2.0,
                volume: Some(disk.volume.clone()),
            });
        }
    }

    alerts
}

/// Capacity-bounded alert history, newest first.
#[derive(Debug)]
pub struct AlertHistory {
    entries: VecDeque<Alert>,
    capacity: usize,
}

impl AlertHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Appends one pass's alerts as a batch; the oldest entries fall off.
    pub fn append(&mut self, alerts: &[Alert]) {
        for alert in alerts {
            self.entries.push_front(alert.clone());
        }
        self.entries.truncate(self.capacity);
    }

    /// All retained alerts, newest first.
    pub fn all(&self) -> Vec<Alert> {
        self.entries.iter().cloned().collect()
    }

    /// Alerts raised within the last `window`.
    pub fn recent(&self, window: Duration) -> Vec<Alert> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::hours(24));
        self.entries
            .iter()
            .filter(|a| a.at > cutoff)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
