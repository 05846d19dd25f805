//! Storage backends for the monitor snapshot
//!
//! The monitor never reads from storage while running. The `StorageActor`
//! writes batched changes to a backend, and the hub loads the snapshot back
//! once at startup through [`NetworkMonitor::restore`](crate::monitor::NetworkMonitor::restore).
//!
//! ## Backends
//!
//! - **SQLite** (feature `storage-sqlite`, default): embedded database file
//! - **In-Memory**: no persistence, for tests or `"backend": "none"`
//!
//! ## Usage
//!
//! ```no_run
//! # #[cfg(feature = "storage-sqlite")]
//! # async fn example() -> anyhow::Result<()> {
//! use netguard::storage::{StorageBackend, sqlite::SqliteBackend};
//!
//! let backend = SqliteBackend::new("./netguard.db").await?;
//! let devices = backend.load_devices().await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthStatus, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;

use tracing::info;

use crate::monitor::NetworkMonitor;
use crate::monitor::alerts::FAULT_LOG_CAPACITY;

/// Load the persisted snapshot into a fresh monitor
pub async fn restore_monitor(backend: &dyn StorageBackend, monitor: &NetworkMonitor) -> StorageResult<()> {
    let devices = backend.load_devices().await?;
    let alerts = backend.load_alerts().await?;
    let fault_logs = backend.load_fault_logs(FAULT_LOG_CAPACITY).await?;
    info!(
        "loaded {} devices, {} alerts, {} fault log entries from storage",
        devices.len(),
        alerts.len(),
        fault_logs.len()
    );

    let repaired = monitor.restore(devices, alerts, fault_logs).await;
    if !repaired.is_empty() {
        backend.upsert_alerts(repaired).await?;
    }
    Ok(())
}
