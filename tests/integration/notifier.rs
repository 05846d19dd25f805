//! Alert notifications delivered to a mock webhook
//!
//! These tests verify that:
//! - Opening and resolving an alert each send one webhook request
//! - Discord payloads carry the alert embed
//! - Muted notifiers suppress deliveries
//! - Failed deliveries are counted, not retried

use std::time::Duration;

use netguard::{
    NetworkMonitor,
    actors::notifier::NotifierHandle,
    config::{AlertConfig, Discord, Webhook},
    notify::Notifier,
};
use pretty_assertions::assert_eq;
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::helpers::{Timeline, device};

const ADDR: &str = "10.1.1.1";

async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<Request> {
    for _ in 0..100 {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests.len() >= count {
            return requests;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {count} requests");
}

async fn mock_server(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

async fn outage_and_recovery(monitor: &NetworkMonitor) {
    let time = Timeline::new();
    monitor.apply_measurement("sw", time.down(ADDR, 1)).await.unwrap();
    monitor.apply_measurement("sw", time.up(ADDR, 4, 2)).await.unwrap();
}

#[tokio::test]
async fn test_webhook_receives_open_and_resolve() {
    let server = mock_server(200).await;
    let monitor = NetworkMonitor::default();
    monitor.register_device(device("sw", ADDR)).await.unwrap();

    let notifier = Notifier::new(AlertConfig::Webhook(Webhook {
        url: format!("{}/hook", server.uri()),
    }))
    .unwrap();
    let handle = NotifierHandle::spawn(notifier, monitor.subscribe());

    outage_and_recovery(&monitor).await;

    let requests = wait_for_requests(&server, 2).await;
    let bodies: Vec<Value> = requests.iter().map(|r| r.body_json().unwrap()).collect();
    assert_eq!(bodies[0]["status"], "active");
    assert_eq!(bodies[0]["kind"], "connectivity");
    assert_eq!(bodies[0]["device"], "Device sw");
    assert_eq!(bodies[0]["address"], ADDR);
    assert_eq!(bodies[1]["status"], "resolved");

    let stats = handle.get_stats().await.unwrap();
    assert_eq!(stats.sent, 2);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_discord_embed_payload() {
    let server = mock_server(204).await;
    let monitor = NetworkMonitor::default();
    monitor.register_device(device("sw", ADDR)).await.unwrap();

    let notifier = Notifier::new(AlertConfig::Discord(Discord {
        url: format!("{}/hook", server.uri()),
        user_id: Some("1234".into()),
    }))
    .unwrap();
    let _handle = NotifierHandle::spawn(notifier, monitor.subscribe());

    monitor
        .apply_measurement("sw", Timeline::new().down(ADDR, 1))
        .await
        .unwrap();

    let requests = wait_for_requests(&server, 1).await;
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["content"], "Device `Device sw` <@1234>");
    assert_eq!(body["embeds"][0]["color"], 15158332);
}

#[tokio::test]
async fn test_muted_notifier_suppresses() {
    let server = mock_server(200).await;
    let monitor = NetworkMonitor::default();
    monitor.register_device(device("sw", ADDR)).await.unwrap();

    let notifier = Notifier::new(AlertConfig::Webhook(Webhook {
        url: format!("{}/hook", server.uri()),
    }))
    .unwrap();
    let handle = NotifierHandle::spawn(notifier, monitor.subscribe());
    handle.mute(Duration::from_secs(600)).await.unwrap();
    assert!(handle.is_muted().await.unwrap());

    outage_and_recovery(&monitor).await;

    let mut stats = handle.get_stats().await.unwrap();
    for _ in 0..50 {
        if stats.suppressed == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        stats = handle.get_stats().await.unwrap();
    }
    assert_eq!(stats.suppressed, 2);
    assert_eq!(stats.sent, 0);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_rejected_delivery_counts_as_failed() {
    let server = mock_server(500).await;
    let monitor = NetworkMonitor::default();
    monitor.register_device(device("sw", ADDR)).await.unwrap();

    let notifier = Notifier::new(AlertConfig::Webhook(Webhook {
        url: format!("{}/hook", server.uri()),
    }))
    .unwrap();
    let handle = NotifierHandle::spawn(notifier, monitor.subscribe());

    monitor
        .apply_measurement("sw", Timeline::new().down(ADDR, 1))
        .await
        .unwrap();

    wait_for_requests(&server, 1).await;
    let mut stats = handle.get_stats().await.unwrap();
    for _ in 0..50 {
        if stats.failed == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        stats = handle.get_stats().await.unwrap();
    }
    assert_eq!(stats.failed, 1);

    // not retried
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
