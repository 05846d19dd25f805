//! Message types for actor communication
//!
//! 1. **Events**: [`MonitorEvent`], broadcast by the monitor to every subscriber
//! 2. **Commands**: request/response messages sent to one actor via mpsc

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::MonitorResult;
use crate::monitor::alerts::{Alert, FaultLogEntry};
use crate::monitor::device::Device;
use crate::monitor::tracker::Transition;

/// Change notification published by the monitor
///
/// Events for one device are sent while that device's lock is held, so a
/// subscriber sees them in the order the state changed. Slow subscribers may
/// lag and miss events; they can resynchronise from the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MonitorEvent {
    DeviceRegistered { device: Device },

    /// Any change to a device record, including each applied measurement
    DeviceUpdated { device: Device },

    #[serde(rename_all = "camelCase")]
    DeviceRemoved { device_id: String },

    Transition { transition: Transition },

    AlertOpened { alert: Alert },

    AlertResolved { alert: Alert },

    FaultLogged { entry: FaultLogEntry },
}

impl MonitorEvent {
    /// The device this event is about
    pub fn device_id(&self) -> &str {
        match self {
            MonitorEvent::DeviceRegistered { device } | MonitorEvent::DeviceUpdated { device } => &device.id,
            MonitorEvent::DeviceRemoved { device_id } => device_id,
            MonitorEvent::Transition { transition } => &transition.device_id,
            MonitorEvent::AlertOpened { alert } | MonitorEvent::AlertResolved { alert } => &alert.device_id,
            MonitorEvent::FaultLogged { entry } => &entry.device_id,
        }
    }
}

/// Summary of one scheduler tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    /// Tick sequence number, starting at 1
    pub tick: u64,

    pub started_at: Option<DateTime<Utc>>,

    /// Probes launched
    pub dispatched: usize,

    /// Devices skipped because their previous probe was still in flight
    pub skipped: usize,

    /// Measurements applied to the tracker (including pending recoveries)
    pub applied: usize,

    /// Measurements the tracker ignored as stale
    pub stale: usize,

    /// Measurements dropped because the device was removed or disabled meanwhile
    pub discarded: usize,

    /// Probe tasks that failed to complete
    pub failed: usize,

    pub unreachable: usize,
    pub transitions: usize,
}

/// Commands that can be sent to the SchedulerActor
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Run a tick now and answer once all of its probes are applied
    TickNow {
        respond_to: oneshot::Sender<TickReport>,
    },

    /// Change the tick interval; must stay longer than the probe timeout
    UpdateInterval {
        interval: Duration,
        respond_to: oneshot::Sender<MonitorResult<()>>,
    },

    /// Stop ticking and abandon in-flight probes
    Shutdown,
}

/// Commands that can be sent to the StorageActor
#[derive(Debug)]
pub enum StorageCommand {
    /// Write all pending changes now
    Flush {
        respond_to: oneshot::Sender<anyhow::Result<()>>,
    },

    GetStats {
        respond_to: oneshot::Sender<StorageStats>,
    },

    /// Flush and stop
    Shutdown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    /// Rows waiting for the next flush
    pub pending: usize,

    pub devices_written: u64,
    pub alerts_written: u64,
    pub fault_logs_written: u64,
    pub devices_deleted: u64,

    pub flush_count: u64,
    pub failed_flushes: u64,

    /// Times the actor reloaded state after missing events
    pub resyncs: u64,
}

/// Commands that can be sent to the NotifierActor
#[derive(Debug)]
pub enum NotifierCommand {
    /// Suppress notifications, e.g. for a maintenance window
    Mute { duration_secs: u64 },

    Unmute,

    IsMuted {
        respond_to: oneshot::Sender<bool>,
    },

    GetStats {
        respond_to: oneshot::Sender<NotifierStats>,
    },

    Shutdown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifierStats {
    pub sent: u64,
    pub failed: u64,
    /// Alerts dropped while muted
    pub suppressed: u64,
}
