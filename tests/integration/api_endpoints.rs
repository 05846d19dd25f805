//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - Device CRUD endpoints return correct responses and status codes
//! - Alerts can be filtered and resolved over HTTP
//! - `POST /scan` runs a tick through the scheduler
//! - Error bodies carry a JSON `error` field

use std::net::SocketAddr;
use std::sync::Arc;

use netguard::{
    NetworkMonitor, ProbeExecutor,
    actors::scheduler::SchedulerHandle,
    api::{ApiState, spawn_api_server},
    config::ApiSettings,
    storage::MemoryBackend,
};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::{Value, json};

use crate::helpers::{Reply, ScriptedProber, manual_scheduler_config};

async fn spawn_test_api(prober: ScriptedProber) -> (SocketAddr, NetworkMonitor) {
    let monitor = NetworkMonitor::default();
    let scheduler = SchedulerHandle::spawn(
        monitor.clone(),
        ProbeExecutor::new(Arc::new(prober)),
        manual_scheduler_config(4),
    )
    .unwrap();

    let state = ApiState::new(monitor.clone())
        .with_scheduler(scheduler)
        .with_storage(Arc::new(MemoryBackend::new()));
    let settings = ApiSettings {
        bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
        enable_cors: true,
    };

    (spawn_api_server(&settings, state).await.unwrap(), monitor)
}

fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}/api/v1{path}")
}

#[tokio::test]
async fn test_health_endpoint() {
    let (addr, _) = spawn_test_api(ScriptedProber::new(Reply::Up(5))).await;

    let body: Value = reqwest::get(url(addr, "/health")).await.unwrap().json().await.unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"]["healthy"], true);
}

#[tokio::test]
async fn test_device_crud() {
    let (addr, _) = spawn_test_api(ScriptedProber::new(Reply::Up(5))).await;
    let client = reqwest::Client::new();

    let response = client
        .post(url(addr, "/devices"))
        .json(&json!({"id": "1", "name": "Core Router", "ip": "192.168.1.1", "type": "router"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["id"], "1");
    assert_eq!(created["type"], "router");
    assert_eq!(created["status"], "online");
    assert_eq!(created["monitored"], true);

    let duplicate = client
        .post(url(addr, "/devices"))
        .json(&json!({"id": "1", "address": "192.168.1.2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let invalid = client
        .post(url(addr, "/devices"))
        .json(&json!({"address": "not a host!"}))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    let error: Value = invalid.json().await.unwrap();
    assert!(error["error"].as_str().unwrap().contains("invalid address"));

    let devices: Vec<Value> = client.get(url(addr, "/devices")).send().await.unwrap().json().await.unwrap();
    assert_eq!(devices.len(), 1);

    let toggled: Value = client
        .patch(url(addr, "/devices/1/toggle"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(toggled["monitored"], false);

    let enabled: Value = client
        .put(url(addr, "/devices/1/monitoring"))
        .json(&json!({"enabled": true}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(enabled["monitored"], true);

    let deleted = client.delete(url(addr, "/devices/1")).send().await.unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);

    let missing = client.get(url(addr, "/devices/1")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_scan_alerts_and_logs() {
    let prober = ScriptedProber::new(Reply::Up(5)).script("10.0.0.5", [Reply::Down]);
    let (addr, monitor) = spawn_test_api(prober).await;
    let client = reqwest::Client::new();

    monitor
        .register_device(netguard::DeviceSpec::new("10.0.0.5").with_id("switch"))
        .await
        .unwrap();
    monitor
        .register_device(netguard::DeviceSpec::new("10.0.0.6").with_id("ap"))
        .await
        .unwrap();

    let report: Value = client.post(url(addr, "/scan")).send().await.unwrap().json().await.unwrap();
    assert_eq!(report["dispatched"], 2);
    assert_eq!(report["transitions"], 1);

    let stats: Value = client.get(url(addr, "/stats")).send().await.unwrap().json().await.unwrap();
    assert_eq!(stats["totalDevices"], 2);
    assert_eq!(stats["offline"], 1);
    assert_eq!(stats["activeAlerts"], 1);

    let active: Vec<Value> = client
        .get(url(addr, "/alerts?status=active&device_id=switch"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["kind"], "connectivity");
    let id = active[0]["id"].as_u64().unwrap();

    let resolved: Value = client
        .post(url(addr, &format!("/alerts/{id}/resolve")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resolved["status"], "resolved");
    assert_eq!(resolved["resolution"], "manual");

    let none: Vec<Value> = client
        .get(url(addr, "/alerts?status=active"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(none.is_empty());

    let missing = client.post(url(addr, "/alerts/999/resolve")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let logs: Vec<Value> = client.get(url(addr, "/logs?limit=5")).send().await.unwrap().json().await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["deviceId"], "switch");
}
