//! In-memory storage backend (no persistence)
//!
//! Useful for tests and for running the hub without a database. All data
//! is lost when the process exits.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use super::backend::{HealthStatus, StorageBackend};
use super::error::StorageResult;
use crate::monitor::alerts::{Alert, AlertId, FaultLogEntry};
use crate::monitor::device::Device;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    devices: RwLock<HashMap<String, Device>>,
    alerts: RwLock<BTreeMap<AlertId, Alert>>,
    fault_logs: RwLock<BTreeMap<u64, FaultLogEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn upsert_devices(&self, devices: Vec<Device>) -> StorageResult<()> {
        trace!("upserting {} devices", devices.len());
        let mut stored = self.devices.write().await;
        for device in devices {
            stored.insert(device.id.clone(), device);
        }
        Ok(())
    }

    async fn delete_devices(&self, ids: Vec<String>) -> StorageResult<()> {
        let mut stored = self.devices.write().await;
        for id in ids {
            stored.remove(&id);
        }
        Ok(())
    }

    async fn upsert_alerts(&self, alerts: Vec<Alert>) -> StorageResult<()> {
        let mut stored = self.alerts.write().await;
        for alert in alerts {
            stored.insert(alert.id, alert);
        }
        Ok(())
    }

    async fn insert_fault_logs(&self, entries: Vec<FaultLogEntry>) -> StorageResult<()> {
        let mut stored = self.fault_logs.write().await;
        for entry in entries {
            stored.entry(entry.id).or_insert(entry);
        }
        Ok(())
    }

    async fn load_devices(&self) -> StorageResult<Vec<Device>> {
        let mut devices: Vec<_> = self.devices.read().await.values().cloned().collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(devices)
    }

    async fn load_alerts(&self) -> StorageResult<Vec<Alert>> {
        Ok(self.alerts.read().await.values().cloned().collect())
    }

    async fn load_fault_logs(&self, limit: usize) -> StorageResult<Vec<FaultLogEntry>> {
        Ok(self
            .fault_logs
            .read()
            .await
            .values()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: true,
            message: "in-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("devices".to_string(), self.devices.read().await.len().to_string()),
                ("alerts".to_string(), self.alerts.read().await.len().to_string()),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
