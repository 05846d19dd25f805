//! API shared state

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::actors::scheduler::SchedulerHandle;
use crate::monitor::NetworkMonitor;
use crate::storage::StorageBackend;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    pub monitor: NetworkMonitor,

    /// Used by `POST /scan`; absent when probing is driven elsewhere
    pub scheduler: Option<SchedulerHandle>,

    /// Reported by the health endpoint
    pub storage: Option<Arc<dyn StorageBackend>>,

    pub started_at: DateTime<Utc>,
}

impl ApiState {
    pub fn new(monitor: NetworkMonitor) -> Self {
        Self {
            monitor,
            scheduler: None,
            storage: None,
            started_at: Utc::now(),
        }
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerHandle) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = Some(storage);
        self
    }
}
