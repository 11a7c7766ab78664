//! Periodic multi-host monitoring.
//!
//! On every pass the monitor fans out over the configured hosts — probe,
//! then collect, per host, all concurrently — and each host's outcome is
//! independent: an unreachable or slow host degrades its own result and
//! never stalls the others. Successful collections overwrite the host's
//! last-known record, are evaluated against the alert thresholds, and
//! contribute their sessions to one atomic full replacement of the session
//! store. A summary event closes each pass.
//!
//! Passes are strictly sequential: the scheduler sleeps only after the
//! previous pass has finished, so a slow fleet shrinks the polling rate
//! instead of piling up overlapping passes.

mod alerts;
mod config;
mod events;
mod store;

pub use alerts::{evaluate, Alert, AlertHistory, AlertKind, AlertSeverity, AlertThresholds};
pub use config::MonitorConfig;
pub use events::MonitorEvent;
pub use store::{MemorySessionStore, SessionStore};

use chrono::{DateTime, Utc};
use hostguard_collector::{Collector, CommandRunner, HostStats, SessionRecord};
use hostguard_core::{EventListener, Listeners};
use hostguard_probe::Prober;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// Last-known state for one host, overwritten on every successful poll.
#[derive(Debug, Clone)]
pub struct HostRecord {
    pub host: String,
    pub stats: HostStats,
    pub last_update: DateTime<Utc>,
}

struct MonitorInner<P, R, S> {
    collector: Collector<P, R>,
    store: S,
    config: RwLock<Arc<MonitorConfig>>,
    records: RwLock<HashMap<String, HostRecord>>,
    history: Mutex<AlertHistory>,
    listeners: Arc<std::sync::Mutex<Listeners<MonitorEvent>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// The recurring monitoring scheduler.
pub struct Monitor<P, R, S> {
    inner: Arc<MonitorInner<P, R, S>>,
}

impl<P, R, S> Clone for Monitor<P, R, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, R, S> Monitor<P, R, S>
where
    P: Prober + Send + Sync + 'static,
    R: CommandRunner + 'static,
    S: SessionStore + 'static,
{
    /// Creates a monitor over the given collector and session store.
    pub fn new(collector: Collector<P, R>, store: S, config: MonitorConfig) -> Self {
        let history = AlertHistory::new(config.alert_history_capacity);
        Self {
            inner: Arc::new(MonitorInner {
                collector,
                store,
                config: RwLock::new(Arc::new(config)),
                records: RwLock::new(HashMap::new()),
                history: Mutex::new(history),
                listeners: Arc::new(std::sync::Mutex::new(Listeners::new())),
                task: Mutex::new(None),
            }),
        }
    }

    /// Adds an event listener.
    pub fn add_listener<L>(&self, listener: L)
    where
        L: EventListener<MonitorEvent> + 'static,
    {
        if let Ok(mut listeners) = self.inner.listeners.lock() {
            listeners.add(listener);
        }
    }

    /// Starts the recurring scheduler: an immediate pass, then one every
    /// configured period. Starting an already-running monitor is a no-op.
    pub async fn start(&self) {
        let mut task = self.inner.task.lock().await;
        if task.is_some() {
            tracing::debug!("monitor already running");
            return;
        }

        tracing::info!("starting monitoring scheduler");
        let weak = Arc::downgrade(&self.inner);
        *task = Some(tokio::spawn(async move {
            loop {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let period = inner.config.read().await.period;
                MonitorInner::run_pass(&inner).await;
                drop(inner);
                tokio::time::sleep(period).await;
            }
        }));
    }

    /// Stops the scheduler. In-flight host collections are abandoned.
    pub async fn stop(&self) {
        if let Some(task) = self.inner.task.lock().await.take() {
            task.abort();
            tracing::info!("monitoring scheduler stopped");
        }
    }

    /// True while the scheduler task is installed.
    pub async fn is_running(&self) -> bool {
        self.inner.task.lock().await.is_some()
    }

    /// Runs one pass immediately, outside the schedule.
    pub async fn run_pass(&self) {
        MonitorInner::run_pass(&self.inner).await;
    }

    /// Replaces the whole configuration; the next pass reads the new value.
    pub async fn update_config(&self, config: MonitorConfig) {
        *self.inner.config.write().await = Arc::new(config);
        self.emit(MonitorEvent::ConfigUpdated { at: Instant::now() });
    }

    /// Replaces just the alert thresholds.
    pub async fn update_thresholds(&self, thresholds: AlertThresholds) {
        {
            let mut config = self.inner.config.write().await;
            let mut next = (**config).clone();
            next.thresholds = thresholds;
            *config = Arc::new(next);
        }
        tracing::info!(?thresholds, "alert thresholds updated");
        self.emit(MonitorEvent::ConfigUpdated { at: Instant::now() });
    }

    /// Last-known record for one host.
    pub async fn cached_stats(&self, host: &str) -> Option<HostRecord> {
        self.inner.records.read().await.get(host).cloned()
    }

    /// Last-known records for every host that has ever succeeded.
    pub async fn all_cached_stats(&self) -> Vec<HostRecord> {
        self.inner.records.read().await.values().cloned().collect()
    }

    /// Retained alerts, newest first.
    pub async fn alert_history(&self) -> Vec<Alert> {
        self.inner.history.lock().await.all()
    }

    /// Alerts raised within `window`.
    pub async fn recent_alerts(&self, window: Duration) -> Vec<Alert> {
        self.inner.history.lock().await.recent(window)
    }

    fn emit(&self, event: MonitorEvent) {
        if let Ok(listeners) = self.inner.listeners.lock() {
            listeners.emit(&event);
        }
    }
}

impl<P, R, S> MonitorInner<P, R, S>
where
    P: Prober + Send + Sync + 'static,
    R: CommandRunner + 'static,
    S: SessionStore + 'static,
{
    /// One pass over every configured host.
    async fn run_pass(inner: &Arc<Self>) {
        let config = Arc::clone(&*inner.config.read().await);
        let hosts = &config.hosts;

        tracing::debug!(hosts = hosts.len(), "monitoring pass starting");

        // Fan out with no coupling between hosts; each future resolves to
        // its own outcome, so one failure cannot affect the rest.
        let outcomes = futures::future::join_all(
            hosts
                .iter()
                .map(|host| async { (host.clone(), inner.collector.collect(host).await) }),
        )
        .await;

        let mut hosts_succeeded = 0;
        let mut pass_alerts = 0;
        let mut all_sessions: Vec<SessionRecord> = Vec::new();

        for (host, outcome) in outcomes {
            let snapshot = match outcome {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    // Degraded, not fatal: the host keeps its last-known
                    // record and the pass moves on.
                    tracing::warn!(host = %host, error = %err, "host collection failed");
                    continue;
                }
            };
            hosts_succeeded += 1;

            let alerts = alerts::evaluate(&host, &snapshot.stats, &config.thresholds);
            if !alerts.is_empty() {
                pass_alerts += alerts.len();
                tracing::warn!(host = %host, count = alerts.len(), "alerts raised");
                inner.history.lock().await.append(&alerts);
                Self::emit(inner, MonitorEvent::HostAlerts {
                    host: host.clone(),
                    at: Instant::now(),
                    alerts,
                });
            }

            inner.records.write().await.insert(
                host.clone(),
                HostRecord {
                    host: host.clone(),
                    stats: snapshot.stats,
                    last_update: Utc::now(),
                },
            );

            all_sessions.extend(snapshot.sessions);
        }

        // The full fleet-wide session set replaces the stored one in a
        // single call; partial replacement is never observable.
        inner.store.replace_all(all_sessions).await;

        tracing::info!(
            checked = hosts.len(),
            succeeded = hosts_succeeded,
            alerts = pass_alerts,
            "monitoring pass complete"
        );

        Self::emit(inner, MonitorEvent::PassCompleted {
            at: Instant::now(),
            hosts_checked: hosts.len(),
            hosts_succeeded,
            alerts: pass_alerts,
        });
    }

    fn emit(inner: &Arc<Self>, event: MonitorEvent) {
        if let Ok(listeners) = inner.listeners.lock() {
            listeners.emit(&event);
        }
    }
}

impl<P, R, S> Drop for MonitorInner<P, R, S> {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostguard_collector::{CommandSpec, RunnerError};
    use hostguard_core::FnListener;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn stats_json(cpu: f64, disk_free: f64) -> String {
        format!(
            r#"{{
                "cpu_percent": {cpu},
                "memory": {{ "total_gb": 32.0, "used_gb": 8.0, "free_gb": 24.0, "used_percent": 25.0 }},
                "disks": [ {{ "volume": "C:", "total_gb": 100.0, "free_gb": {disk_free}, "used_gb": 0.0, "used_percent": 0.0 }} ]
            }}"#
        )
    }

    const SESSIONS: &str = "\
 USERNAME              SESSIONNAME        ID  STATE   IDLE TIME  LOGON TIME\n\
 jsmith                rdp-tcp#12          2  Active          .  18/07/2025 09:15\n";

    fn monitor_over(
        hosts: Vec<&str>,
        up: &'static [&'static str],
        cpu: f64,
    ) -> Monitor<impl Prober, impl CommandRunner, MemorySessionStore> {
        let prober = move |host: &str| {
            let host = host.to_string();
            async move { up.contains(&host.as_str()) }
        };
        let runner = move |_host: &str, command: CommandSpec| async move {
            match command {
                CommandSpec::SystemStats => Ok(stats_json(cpu, 50.0)),
                CommandSpec::SessionList => Ok(SESSIONS.to_string()),
            }
        };
        let config = MonitorConfig {
            hosts: hosts.into_iter().map(String::from).collect(),
            period: Duration::from_secs(3600),
            ..MonitorConfig::default()
        };
        Monitor::new(Collector::new(prober, runner), MemorySessionStore::new(), config)
    }

    #[tokio::test]
    async fn pass_records_stats_and_replaces_sessions() {
        let monitor = monitor_over(vec!["rds-01"], &["rds-01"], 20.0);
        monitor.run_pass().await;

        let record = monitor.cached_stats("rds-01").await.unwrap();
        assert_eq!(record.stats.cpu_percent, 20.0);
        assert_eq!(monitor.inner.store.all().await.len(), 1);
        assert!(monitor.alert_history().await.is_empty());
    }

    #[tokio::test]
    async fn cpu_over_threshold_raises_one_warning() {
        let monitor = monitor_over(vec!["rds-01"], &["rds-01"], 95.0);
        monitor.run_pass().await;

        let alerts = monitor.alert_history().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Cpu);
        assert_eq!(alerts[0].value, 95.0);
        assert_eq!(alerts[0].threshold, 90.0);
    }

    #[tokio::test]
    async fn unreachable_host_does_not_affect_the_others() {
        let monitor = monitor_over(vec!["rds-01", "rds-02"], &["rds-01"], 20.0);

        let summaries = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&summaries);
        monitor.add_listener(FnListener::new(move |event: &MonitorEvent| {
            if let MonitorEvent::PassCompleted {
                hosts_checked,
                hosts_succeeded,
                ..
            } = event
            {
                assert_eq!(*hosts_checked, 2);
                assert_eq!(*hosts_succeeded, 1);
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }));

        monitor.run_pass().await;

        assert_eq!(summaries.load(Ordering::SeqCst), 1);
        assert!(monitor.cached_stats("rds-01").await.is_some());
        assert!(monitor.cached_stats("rds-02").await.is_none());
        // The unreachable host raised no alert.
        assert!(monitor.alert_history().await.is_empty());
    }

    #[tokio::test]
    async fn empty_host_list_is_a_no_op_pass() {
        let monitor = monitor_over(vec![], &[], 20.0);
        monitor.run_pass().await;
        assert!(monitor.all_cached_stats().await.is_empty());
    }

    #[tokio::test]
    async fn scheduler_start_stop() {
        let monitor = monitor_over(vec!["rds-01"], &["rds-01"], 20.0);
        monitor.start().await;
        assert!(monitor.is_running().await);

        // The immediate first pass lands without waiting for the period.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(monitor.cached_stats("rds-01").await.is_some());

        monitor.stop().await;
        assert!(!monitor.is_running().await);
    }

    #[tokio::test]
    async fn update_thresholds_applies_to_next_pass() {
        let monitor = monitor_over(vec!["rds-01"], &["rds-01"], 50.0);
        monitor.run_pass().await;
        assert!(monitor.alert_history().await.is_empty());

        monitor
            .update_thresholds(AlertThresholds {
                cpu_percent: 40.0,
                ..AlertThresholds::default()
            })
            .await;
        monitor.run_pass().await;
        assert_eq!(monitor.alert_history().await.len(), 1);
    }

    #[tokio::test]
    async fn session_listing_failure_still_records_stats() {
        let prober = |_host: &str| async { true };
        let runner = |_host: &str, command: CommandSpec| async move {
            match command {
                CommandSpec::SystemStats => Ok(stats_json(20.0, 50.0)),
                CommandSpec::SessionList => Err(RunnerError::Denied("nope".into())),
            }
        };
        let config = MonitorConfig {
            hosts: vec!["rds-01".to_string()],
            ..MonitorConfig::default()
        };
        let monitor = Monitor::new(
            Collector::new(prober, runner),
            MemorySessionStore::new(),
            config,
        );

        monitor.run_pass().await;
        assert!(monitor.cached_stats("rds-01").await.is_some());
        assert!(monitor.inner.store.all().await.is_empty());
    }
}
