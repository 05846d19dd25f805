//! Scheduler → executor → monitor pipeline
//!
//! These tests verify that:
//! - Every monitored device is probed exactly once per tick
//! - The concurrency cap holds across a large fleet
//! - Probe results drive status transitions and alerts
//! - Disabled and removed devices are not probed

use std::sync::Arc;
use std::time::Duration;

use netguard::{
    AlertFilter, NetworkMonitor, ProbeExecutor, Status, actors::scheduler::SchedulerHandle,
};
use pretty_assertions::assert_eq;

use crate::helpers::{CountingProber, Reply, ScriptedProber, device, manual_scheduler_config};

fn address(i: usize) -> String {
    format!("10.0.{}.{}", i / 200, i % 200 + 1)
}

#[tokio::test]
async fn test_fifty_devices_respect_concurrency_cap() {
    let monitor = NetworkMonitor::default();
    for i in 0..50 {
        monitor.register_device(device(&format!("d{i}"), &address(i))).await.unwrap();
    }

    let prober = Arc::new(CountingProber::new(Duration::from_millis(40)));
    let scheduler = SchedulerHandle::spawn(
        monitor.clone(),
        ProbeExecutor::new(prober.clone()),
        manual_scheduler_config(10),
    )
    .unwrap();

    let report = scheduler.tick_now().await.unwrap();

    assert_eq!(report.dispatched, 50);
    assert_eq!(report.applied, 50);
    assert_eq!(report.skipped, 0);
    assert!(prober.max_in_flight() <= 10, "peak concurrency {}", prober.max_in_flight());
    assert!(prober.max_in_flight() > 1);

    let calls = prober.calls_per_target();
    assert_eq!(calls.len(), 50);
    assert!(calls.values().all(|&n| n == 1));

    let stats = monitor.get_stats().await;
    assert_eq!(stats.total_devices, 50);
    assert_eq!(stats.online, 50);

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_probe_results_drive_transitions() {
    let monitor = NetworkMonitor::default();
    monitor.register_device(device("web", "10.0.0.10")).await.unwrap();
    monitor.register_device(device("db", "10.0.0.20")).await.unwrap();

    let prober = Arc::new(
        ScriptedProber::new(Reply::Up(5))
            .script("10.0.0.10", [Reply::Down, Reply::Up(5)])
            .script("10.0.0.20", [Reply::Up(250), Reply::Up(250)]),
    );
    let scheduler = SchedulerHandle::spawn(
        monitor.clone(),
        ProbeExecutor::new(prober.clone()),
        manual_scheduler_config(4),
    )
    .unwrap();

    let report = scheduler.tick_now().await.unwrap();
    assert_eq!(report.transitions, 2);
    assert_eq!(report.unreachable, 1);
    assert_eq!(monitor.get_device("web").await.unwrap().status, Status::Offline);
    assert_eq!(monitor.get_device("db").await.unwrap().status, Status::Slow);
    assert_eq!(monitor.list_alerts(&AlertFilter::active()).await.len(), 2);

    let report = scheduler.tick_now().await.unwrap();
    assert_eq!(report.transitions, 1);
    assert_eq!(monitor.get_device("web").await.unwrap().status, Status::Online);

    let active = monitor.list_alerts(&AlertFilter::active()).await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].device_id, "db");
    assert_eq!(prober.calls(), 4);
}

#[tokio::test]
async fn test_unmonitored_and_removed_devices_are_skipped() {
    let monitor = NetworkMonitor::default();
    monitor.register_device(device("a", "10.0.0.1")).await.unwrap();
    monitor
        .register_device(device("b", "10.0.0.2").unmonitored())
        .await
        .unwrap();
    monitor.register_device(device("c", "10.0.0.3")).await.unwrap();
    monitor.deregister_device("c").await.unwrap();

    let prober = Arc::new(ScriptedProber::new(Reply::Up(5)));
    let scheduler = SchedulerHandle::spawn(
        monitor.clone(),
        ProbeExecutor::new(prober.clone()),
        manual_scheduler_config(4),
    )
    .unwrap();

    let report = scheduler.tick_now().await.unwrap();
    assert_eq!(report.dispatched, 1);
    assert_eq!(prober.calls(), 1);
}

#[tokio::test]
async fn test_periodic_ticks_run_after_interval_update() {
    let monitor = NetworkMonitor::default();
    monitor.register_device(device("a", "10.0.0.1")).await.unwrap();

    let prober = Arc::new(ScriptedProber::new(Reply::Up(5)));
    let scheduler = SchedulerHandle::spawn(
        monitor.clone(),
        ProbeExecutor::new(prober.clone()),
        manual_scheduler_config(1),
    )
    .unwrap();

    // shorter than the probe timeout
    assert!(scheduler.update_interval(Duration::from_millis(100)).await.is_err());

    scheduler.update_interval(Duration::from_secs(1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2300)).await;

    assert!(prober.calls() >= 2, "only {} probes ran", prober.calls());
    scheduler.shutdown().await.unwrap();
}
