//! Alert lifecycle driven through the public monitor API
//!
//! These tests verify that:
//! - Faults open exactly one alert per device and kind
//! - Recovery and fault changes resolve the previous alert
//! - Manual resolution is idempotent
//! - Deregistration tombstones open alerts
//! - Events are published in state-change order

use assert_matches::assert_matches;
use netguard::{
    AlertFilter, AlertStatus, ApplyOutcome, FaultKind, MonitorEvent, NetworkMonitor, Resolution, Status,
    TrackerConfig, UptimeWindow,
};
use pretty_assertions::assert_eq;

use crate::helpers::{Timeline, device};

const ADDR: &str = "192.168.1.1";

async fn monitor_with_router() -> NetworkMonitor {
    let monitor = NetworkMonitor::default();
    monitor.register_device(device("router", ADDR)).await.unwrap();
    monitor
}

#[tokio::test]
async fn test_outage_opens_and_recovery_resolves() {
    let monitor = monitor_with_router().await;
    let time = Timeline::new();

    let outcome = monitor.apply_measurement("router", time.down(ADDR, 1)).await.unwrap();
    assert_matches!(outcome, ApplyOutcome::Applied(Some(ref t)) if t.to == Status::Offline);

    let active = monitor.list_alerts(&AlertFilter::active()).await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].kind, FaultKind::Connectivity);
    assert_eq!(active[0].message, "Connection lost: Device router is unreachable");

    // a second failure does not open another alert
    let outcome = monitor.apply_measurement("router", time.down(ADDR, 2)).await.unwrap();
    assert_matches!(outcome, ApplyOutcome::Applied(None));
    assert_eq!(monitor.list_alerts(&AlertFilter::default()).await.len(), 1);

    monitor.apply_measurement("router", time.up(ADDR, 12, 3)).await.unwrap();

    let alert = monitor.get_alert(active[0].id).await.unwrap();
    assert_eq!(alert.status, AlertStatus::Resolved);
    assert_eq!(alert.resolution, Some(Resolution::Recovered));
    assert!(alert.resolved_at.is_some());

    let device = monitor.get_device("router").await.unwrap();
    assert_eq!(device.status, Status::Online);
    assert_eq!(device.latency_ms, Some(12));
    assert_eq!(monitor.get_stats().await.active_alerts, 0);
}

#[tokio::test]
async fn test_latency_alert_replaced_by_connectivity_alert() {
    let monitor = monitor_with_router().await;
    let time = Timeline::new();

    monitor.apply_measurement("router", time.up(ADDR, 400, 1)).await.unwrap();
    let latency = monitor.list_alerts(&AlertFilter::active()).await;
    assert_eq!(latency.len(), 1);
    assert_eq!(latency[0].kind, FaultKind::Latency);
    assert_eq!(latency[0].message, "High latency detected: 400ms on Device router");

    monitor.apply_measurement("router", time.down(ADDR, 2)).await.unwrap();

    let active = monitor.list_alerts(&AlertFilter::active()).await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].kind, FaultKind::Connectivity);

    let latency = monitor.get_alert(latency[0].id).await.unwrap();
    assert_eq!(latency.resolution, Some(Resolution::Recovered));

    // newest first
    let all = monitor.list_alerts(&AlertFilter::default()).await;
    assert_eq!(all.iter().map(|a| a.kind).collect::<Vec<_>>(), vec![FaultKind::Connectivity, FaultKind::Latency]);

    let logs = monitor.list_fault_logs(10).await;
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].kind, FaultKind::Connectivity);
}

#[tokio::test]
async fn test_manual_resolve_is_idempotent() {
    let monitor = monitor_with_router().await;
    let time = Timeline::new();
    monitor.apply_measurement("router", time.down(ADDR, 1)).await.unwrap();
    let id = monitor.list_alerts(&AlertFilter::active()).await[0].id;

    let first = monitor.resolve_alert(id).await.unwrap();
    let second = monitor.resolve_alert(id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.resolution, Some(Resolution::Manual));

    // still offline, so no new alert until the device leaves and re-enters the fault
    monitor.apply_measurement("router", time.down(ADDR, 2)).await.unwrap();
    assert!(monitor.list_alerts(&AlertFilter::active()).await.is_empty());

    monitor.apply_measurement("router", time.up(ADDR, 5, 3)).await.unwrap();
    monitor.apply_measurement("router", time.down(ADDR, 4)).await.unwrap();
    assert_eq!(monitor.list_alerts(&AlertFilter::active()).await.len(), 1);
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let monitor = monitor_with_router().await;

    assert!(monitor.get_device("nope").await.unwrap_err().is_not_found());
    assert!(monitor.resolve_alert(netguard::AlertId(99)).await.unwrap_err().is_not_found());
    assert!(
        monitor
            .apply_measurement("nope", Timeline::new().down(ADDR, 1))
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_deregister_tombstones_active_alerts() {
    let monitor = monitor_with_router().await;
    monitor.apply_measurement("router", Timeline::new().down(ADDR, 1)).await.unwrap();

    let removed = monitor.deregister_device("router").await.unwrap();
    assert_eq!(removed.id, "router");

    let alerts = monitor.list_alerts(&AlertFilter::default()).await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].resolution, Some(Resolution::DeviceRemoved));
    assert!(monitor.list_devices().await.is_empty());
    assert_eq!(monitor.get_stats().await.active_alerts, 0);
}

#[tokio::test]
async fn test_late_measurement_is_stale() {
    let monitor = monitor_with_router().await;
    let time = Timeline::new();

    monitor.apply_measurement("router", time.up(ADDR, 10, 5)).await.unwrap();
    let outcome = monitor.apply_measurement("router", time.down(ADDR, 4)).await.unwrap();

    assert_matches!(outcome, ApplyOutcome::Stale);
    assert_eq!(monitor.get_device("router").await.unwrap().status, Status::Online);
}

#[tokio::test]
async fn test_disabled_device_discards_measurements() {
    let monitor = monitor_with_router().await;
    let time = Timeline::new();

    monitor.set_monitored("router", false).await.unwrap();
    let outcome = monitor.apply_measurement("router", time.down(ADDR, 1)).await.unwrap();
    assert_matches!(outcome, ApplyOutcome::Discarded);

    let stats = monitor.get_stats().await;
    assert_eq!(stats.unmonitored, 1);
    assert_eq!(stats.online + stats.slow + stats.offline, 0);

    let device = monitor.toggle_monitoring("router").await.unwrap();
    assert!(device.monitored);
}

#[tokio::test]
async fn test_recovery_confirmations_delay_leaving_offline() {
    let config = TrackerConfig {
        recovery_confirmations: 2,
        ..TrackerConfig::default()
    };
    let monitor = NetworkMonitor::new(config, UptimeWindow::SinceStart);
    monitor.register_device(device("router", ADDR)).await.unwrap();
    let time = Timeline::new();

    monitor.apply_measurement("router", time.down(ADDR, 1)).await.unwrap();
    let outcome = monitor.apply_measurement("router", time.up(ADDR, 8, 2)).await.unwrap();
    assert_matches!(outcome, ApplyOutcome::Pending);

    let device = monitor.get_device("router").await.unwrap();
    assert_eq!(device.status, Status::Offline);
    assert_eq!(device.latency_ms, None);
    assert_eq!(monitor.get_stats().await.active_alerts, 1);

    let outcome = monitor.apply_measurement("router", time.up(ADDR, 8, 3)).await.unwrap();
    assert_matches!(outcome, ApplyOutcome::Applied(Some(ref t)) if t.to == Status::Online);
    assert_eq!(monitor.get_stats().await.active_alerts, 0);
}

#[tokio::test]
async fn test_event_order_for_a_transition() {
    let monitor = monitor_with_router().await;
    let time = Timeline::new();
    monitor.apply_measurement("router", time.up(ADDR, 300, 1)).await.unwrap();

    let mut events = monitor.subscribe();
    monitor.apply_measurement("router", time.down(ADDR, 2)).await.unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(match event {
            MonitorEvent::Transition { .. } => "transition",
            MonitorEvent::AlertResolved { .. } => "resolved",
            MonitorEvent::FaultLogged { .. } => "fault",
            MonitorEvent::AlertOpened { .. } => "opened",
            MonitorEvent::DeviceUpdated { .. } => "updated",
            MonitorEvent::DeviceRegistered { .. } | MonitorEvent::DeviceRemoved { .. } => "other",
        });
    }

    assert_eq!(kinds, vec!["transition", "resolved", "fault", "opened", "updated"]);
}
