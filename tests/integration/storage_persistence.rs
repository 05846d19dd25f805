//! Persistence round trip through the StorageActor and SQLite
//!
//! These tests verify that:
//! - Monitor state written by the StorageActor survives a restart
//! - Deregistered devices are deleted while their alerts are kept
//! - Restored devices resume their last status and keep deduplicating alerts
//! - Active alerts left behind by a partial write are resolved on restore

use std::sync::Arc;
use std::time::Duration;

use netguard::{
    AlertFilter, FaultKind, NetworkMonitor, Resolution, Status,
    actors::storage::StorageHandle,
    storage::{StorageBackend, restore_monitor, sqlite::SqliteBackend},
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use crate::helpers::{Timeline, device};

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("netguard.db");
    let time = Timeline::new();

    {
        let backend = Arc::new(SqliteBackend::new(&db_path).await.unwrap());
        let monitor = NetworkMonitor::default();
        let storage = StorageHandle::spawn(backend.clone(), &monitor, Duration::from_secs(3600));

        monitor.register_device(device("router", "192.168.1.1")).await.unwrap();
        monitor.register_device(device("nas", "192.168.1.20")).await.unwrap();
        monitor.register_device(device("old", "192.168.1.30")).await.unwrap();

        monitor.apply_measurement("router", time.down("192.168.1.1", 1)).await.unwrap();
        monitor.apply_measurement("nas", time.up("192.168.1.20", 320, 1)).await.unwrap();
        monitor.apply_measurement("old", time.down("192.168.1.30", 1)).await.unwrap();
        monitor.deregister_device("old").await.unwrap();

        storage.flush().await.unwrap();
        let stats = storage.get_stats().await.unwrap();
        assert_eq!(stats.pending, 0);
        assert!(stats.flush_count >= 1);

        storage.shutdown().await.unwrap();
    }

    let backend = SqliteBackend::new(&db_path).await.unwrap();
    let monitor = NetworkMonitor::default();
    restore_monitor(&backend, &monitor).await.unwrap();

    let devices = monitor.list_devices().await;
    let ids: Vec<_> = devices.iter().map(|d| d.id.as_str()).collect();
    assert!(ids.contains(&"router") && ids.contains(&"nas"));
    assert!(!ids.contains(&"old"));

    assert_eq!(monitor.get_device("router").await.unwrap().status, Status::Offline);
    assert_eq!(monitor.get_device("nas").await.unwrap().status, Status::Slow);

    let alerts = monitor.list_alerts(&AlertFilter::default()).await;
    assert_eq!(alerts.len(), 3);
    let removed = alerts.iter().find(|a| a.device_id == "old").unwrap();
    assert_eq!(removed.resolution, Some(Resolution::DeviceRemoved));
    assert_eq!(monitor.list_alerts(&AlertFilter::active()).await.len(), 2);

    assert_eq!(monitor.list_fault_logs(10).await.len(), 3);

    // still offline: no duplicate connectivity alert after the restart
    monitor
        .apply_measurement("router", time.down("192.168.1.1", 10))
        .await
        .unwrap();
    let router_alerts = monitor
        .list_alerts(&AlertFilter {
            device_id: Some("router".into()),
            ..AlertFilter::active()
        })
        .await;
    assert_eq!(router_alerts.len(), 1);
    assert_eq!(router_alerts[0].kind, FaultKind::Connectivity);

    // ids keep increasing across restarts
    monitor
        .apply_measurement("nas", time.down("192.168.1.20", 10))
        .await
        .unwrap();
    let newest = &monitor.list_alerts(&AlertFilter::default()).await[0];
    assert!(alerts.iter().all(|a| a.id < newest.id));

    backend.close().await.unwrap();
}

#[tokio::test]
async fn test_restore_resolves_alerts_without_device_row() {
    let dir = tempdir().unwrap();
    let backend = SqliteBackend::new(dir.path().join("partial.db")).await.unwrap();
    let time = Timeline::new();

    // alert row persisted, device deletion persisted before it
    let source = NetworkMonitor::default();
    source.register_device(device("ghost", "192.168.1.40")).await.unwrap();
    source.apply_measurement("ghost", time.down("192.168.1.40", 1)).await.unwrap();
    backend
        .upsert_alerts(source.list_alerts(&AlertFilter::default()).await)
        .await
        .unwrap();

    let monitor = NetworkMonitor::default();
    restore_monitor(&backend, &monitor).await.unwrap();

    assert!(monitor.list_alerts(&AlertFilter::active()).await.is_empty());
    assert_eq!(monitor.get_stats().await.active_alerts, 0);

    let stored = backend.load_alerts().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].resolution, Some(Resolution::DeviceRemoved));
    assert!(stored[0].resolved_at.is_some());

    backend.close().await.unwrap();
}

#[tokio::test]
async fn test_health_check_reports_sqlite() {
    let dir = tempdir().unwrap();
    let backend = SqliteBackend::new(dir.path().join("health.db")).await.unwrap();

    let health = backend.health_check().await.unwrap();
    assert!(health.healthy);
}
