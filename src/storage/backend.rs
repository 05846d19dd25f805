//! Storage backend trait definition

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

use super::error::StorageResult;
use crate::monitor::alerts::{Alert, FaultLogEntry};
use crate::monitor::device::Device;

/// Health status of the storage backend
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: String,

    /// Backend-specific details (row counts, file path, ...)
    pub metadata: HashMap<String, String>,
}

/// Durable snapshot of monitor state
///
/// The monitor itself runs purely in memory; a backend receives batched
/// changes from the `StorageActor` and is read back once at startup.
///
/// Writes are upserts keyed by id so replaying a batch is harmless.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Insert or replace device records
    async fn upsert_devices(&self, devices: Vec<Device>) -> StorageResult<()>;

    /// Delete devices by id (their alerts are kept as audit trail)
    async fn delete_devices(&self, ids: Vec<String>) -> StorageResult<()>;

    /// Insert or replace alerts
    async fn upsert_alerts(&self, alerts: Vec<Alert>) -> StorageResult<()>;

    /// Append fault log entries; entries already stored are ignored
    async fn insert_fault_logs(&self, entries: Vec<FaultLogEntry>) -> StorageResult<()>;

    async fn load_devices(&self) -> StorageResult<Vec<Device>>;

    async fn load_alerts(&self) -> StorageResult<Vec<Alert>>;

    /// The newest `limit` fault log entries, newest first
    async fn load_fault_logs(&self, limit: usize) -> StorageResult<Vec<FaultLogEntry>>;

    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Release connections; further calls may fail
    async fn close(&self) -> StorageResult<()>;
}
