use hostguard_collector::{Collector, CommandSpec, RunnerError};
use hostguard_core::FnListener;
use hostguard_monitor::{
    AlertKind, AlertSeverity, MemorySessionStore, Monitor, MonitorConfig, MonitorEvent,
    SessionStore,
};
use hostguard_probe::probe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const HOT_STATS: &str = r#"{
    "cpu_percent": 95.0,
    "memory": { "total_gb": 32.0, "used_gb": 8.0, "free_gb": 24.0, "used_percent": 25.0 },
    "disks": [ { "volume": "C:", "total_gb": 100.0, "used_gb": 40.0, "free_gb": 60.0, "used_percent": 40.0 } ]
}"#;

const SESSIONS: &str = "\
 USERNAME              SESSIONNAME        ID  STATE   IDLE TIME  LOGON TIME\n\
 jsmith                rdp-tcp#12          2  Active          .  18/07/2025 09:15\n\
 mdupont                                   4  Disc         1+03  17/07/2025 22:41\n";

/// Host A is reachable with CPU at 95% against a 90% threshold; host B is
/// unreachable. One pass yields exactly one cpu warning for A, no record
/// and no alert for B, and B's failure leaves A's result untouched.
#[tokio::test]
async fn hot_host_alerts_and_dead_host_is_isolated() {
    let _ = tracing_subscriber::fmt::try_init();

    let prober = |host: &str| {
        let host = host.to_string();
        async move { host == "rds-a" }
    };
    let runner = |_host: &str, command: CommandSpec| async move {
        match command {
            CommandSpec::SystemStats => Ok(HOT_STATS.to_string()),
            CommandSpec::SessionList => Ok(SESSIONS.to_string()),
        }
    };

    let monitor = Monitor::new(
        Collector::new(prober, runner),
        MemorySessionStore::new(),
        MonitorConfig {
            hosts: vec!["rds-a".to_string(), "rds-b".to_string()],
            ..MonitorConfig::default()
        },
    );

    let host_alert_events = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&host_alert_events);
    monitor.add_listener(FnListener::new(move |event: &MonitorEvent| {
        if let MonitorEvent::HostAlerts { host, alerts, .. } = event {
            assert_eq!(host, "rds-a");
            assert_eq!(alerts.len(), 1);
            seen.fetch_add(1, Ordering::SeqCst);
        }
    }));

    monitor.run_pass().await;

    let alerts = monitor.alert_history().await;
    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.host, "rds-a");
    assert_eq!(alert.kind, AlertKind::Cpu);
    assert_eq!(alert.severity, AlertSeverity::Warning);
    assert_eq!(alert.value, 95.0);
    assert_eq!(alert.threshold, 90.0);

    assert_eq!(host_alert_events.load(Ordering::SeqCst), 1);
    assert!(monitor.cached_stats("rds-a").await.is_some());
    assert!(monitor.cached_stats("rds-b").await.is_none());
}

/// A full pass replaces the session store with the fleet-wide session set.
#[tokio::test]
async fn sessions_are_replaced_wholesale_each_pass() {
    let runner = |_host: &str, command: CommandSpec| async move {
        match command {
            CommandSpec::SystemStats => Ok(HOT_STATS.to_string()),
            CommandSpec::SessionList => Ok(SESSIONS.to_string()),
        }
    };
    let store = Arc::new(MemorySessionStore::new());
    let monitor = Monitor::new(
        Collector::new(|_host: &str| async { true }, runner),
        Arc::clone(&store),
        MonitorConfig {
            hosts: vec!["rds-a".to_string()],
            ..MonitorConfig::default()
        },
    );

    monitor.run_pass().await;
    assert_eq!(store.all().await.len(), 2);

    // A host that stops answering the session query leaves only an empty
    // replacement behind.
    let empty_runner = |_host: &str, command: CommandSpec| async move {
        match command {
            CommandSpec::SystemStats => Ok(HOT_STATS.to_string()),
            CommandSpec::SessionList => Err(RunnerError::Failed("no listing".into())),
        }
    };
    let second = Monitor::new(
        Collector::new(|_host: &str| async { true }, empty_runner),
        Arc::clone(&store),
        MonitorConfig {
            hosts: vec!["rds-a".to_string()],
            ..MonitorConfig::default()
        },
    );
    second.run_pass().await;
    assert!(store.all().await.is_empty());
}

/// The prober against a closed port answers false within the timeout plus
/// negligible overhead, and never errors.
#[tokio::test]
async fn probe_against_closed_port_is_false_and_prompt() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let started = Instant::now();
    let reachable = probe("127.0.0.1", port, Duration::from_millis(300)).await;
    assert!(!reachable);
    assert!(started.elapsed() < Duration::from_millis(800));
}

/// The scheduler keeps polling on its period until stopped.
#[tokio::test]
async fn scheduler_polls_repeatedly() {
    let passes = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&passes);

    let runner = |_host: &str, command: CommandSpec| async move {
        match command {
            CommandSpec::SystemStats => Ok("{}".to_string()),
            CommandSpec::SessionList => Ok(String::new()),
        }
    };
    let monitor = Monitor::new(
        Collector::new(|_host: &str| async { true }, runner),
        MemorySessionStore::new(),
        MonitorConfig {
            hosts: vec!["rds-a".to_string()],
            period: Duration::from_millis(25),
            ..MonitorConfig::default()
        },
    );
    monitor.add_listener(FnListener::new(move |event: &MonitorEvent| {
        if matches!(event, MonitorEvent::PassCompleted { .. }) {
            seen.fetch_add(1, Ordering::SeqCst);
        }
    }));

    monitor.start().await;
    tokio::time::sleep(Duration::from_millis(120)).await;
    monitor.stop().await;

    let observed = passes.load(Ordering::SeqCst);
    assert!(observed >= 2, "expected repeated passes, saw {observed}");

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(passes.load(Ordering::SeqCst), observed);
}
