//! NetGuard - concurrent reachability monitoring for network devices
//!
//! Devices are probed on a fixed tick by the [`SchedulerActor`](actors::scheduler::SchedulerActor).
//! Each measurement is classified by a per-device state tracker; status
//! transitions open and resolve alerts, feed the uptime ledger and are
//! published as [`MonitorEvent`]s for storage, notifications and the
//! WebSocket stream.

pub mod actors;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod discord;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod probe;
pub mod storage;
pub mod util;

pub use actors::messages::{MonitorEvent, TickReport};
pub use error::{MonitorError, MonitorResult};
pub use monitor::alerts::{Alert, AlertFilter, AlertId, AlertStatus, FaultKind, FaultLogEntry, Resolution};
pub use monitor::device::{Device, DeviceClass, DeviceSpec, NetworkStats, Status};
pub use monitor::tracker::{TrackerConfig, Transition};
pub use monitor::uptime::UptimeWindow;
pub use monitor::{ApplyOutcome, NetworkMonitor};
pub use probe::{Measurement, ProbeExecutor, ProbeTarget, Prober};
