//! NetworkMonitor - the monitoring engine's external interface
//!
//! ```text
//! Scheduler → apply_measurement(id, m)
//!                 │  (device lock held)
//!                 ├─ StateTracker::observe  → Transition?
//!                 ├─ AlertManager::on_transition
//!                 ├─ UptimeLedger::record
//!                 └─ publish MonitorEvent → [StorageActor, NotifierActor, WebSocket]
//! ```
//!
//! The monitor is cheap to clone; all clones share the same state.
//!
//! ## Locking
//!
//! Lock order is registry map, then device mutex, then the alert manager.
//! The alert manager is one `RwLock` shared by all devices because its
//! indexes (alert ids, fault log sequence) are global. It is held only for
//! in-memory bookkeeping, never across I/O or a probe, so probes for
//! different devices still run in parallel and only the short alert update
//! after a transition is serialised.

pub mod alerts;
pub mod device;
pub mod registry;
pub mod tracker;
pub mod uptime;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, instrument, trace, warn};

use crate::actors::messages::MonitorEvent;
use crate::error::{MonitorError, MonitorResult};
use crate::probe::{Measurement, ProbeTarget};

use alerts::{Alert, AlertFilter, AlertId, AlertManager, FaultLogEntry};
use device::{Device, DeviceSpec, NetworkStats, Status};
use registry::{DeviceEntry, DeviceRecord, DeviceRegistry};
use tracker::{Observation, StateTracker, TrackerConfig, Transition};
use uptime::{UptimeLedger, UptimeWindow};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Default number of fault log entries returned
pub const DEFAULT_FAULT_LOG_LIMIT: usize = 100;

/// What happened to a measurement handed to the monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Applied; carries the transition if the status changed
    Applied(Option<Transition>),

    /// Applied, but the device is still confirming a recovery
    Pending,

    /// Older than the last applied measurement
    Stale,

    /// The device was removed or has monitoring disabled
    Discarded,
}

struct Inner {
    registry: DeviceRegistry,
    alerts: RwLock<AlertManager>,
    tracker_config: TrackerConfig,
    uptime_window: UptimeWindow,
    events: broadcast::Sender<MonitorEvent>,
}

#[derive(Clone)]
pub struct NetworkMonitor {
    inner: Arc<Inner>,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(TrackerConfig::default(), UptimeWindow::default())
    }
}

impl NetworkMonitor {
    pub fn new(tracker_config: TrackerConfig, uptime_window: UptimeWindow) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                registry: DeviceRegistry::new(),
                alerts: RwLock::new(AlertManager::new()),
                tracker_config,
                uptime_window,
                events,
            }),
        }
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.events.subscribe()
    }

    fn publish(&self, event: MonitorEvent) {
        // no receivers is fine
        if let Ok(receivers) = self.inner.events.send(event) {
            trace!("published event to {receivers} receivers");
        }
    }

    pub async fn list_devices(&self) -> Vec<Device> {
        let now = Utc::now();
        let mut devices = Vec::new();
        for entry in self.inner.registry.entries().await {
            let record = entry.state.lock().await;
            if !record.removed {
                devices.push(record.snapshot(now));
            }
        }
        devices
    }

    pub async fn get_device(&self, id: &str) -> MonitorResult<Device> {
        let entry = self.inner.registry.get(id).await?;
        let record = entry.state.lock().await;
        Ok(record.snapshot(Utc::now()))
    }

    #[instrument(skip(self, spec), fields(address = %spec.address))]
    pub async fn register_device(&self, spec: DeviceSpec) -> MonitorResult<Device> {
        let target = ProbeTarget::parse(&spec.address)?;
        let now = Utc::now();
        let window = self.inner.uptime_window;

        let entry = self
            .inner
            .registry
            .insert(spec.id.clone(), target, |id| {
                let mut uptime = UptimeLedger::new(window, None);
                if spec.monitored {
                    uptime.start(Status::Online, now);
                }
                DeviceRecord {
                    device: Device {
                        id: id.to_string(),
                        name: spec.name.clone().unwrap_or_else(|| spec.address.clone()),
                        address: spec.address.trim().to_string(),
                        class: spec.class.clone(),
                        monitored: spec.monitored,
                        status: Status::Online,
                        latency_ms: None,
                        last_checked: None,
                        uptime: 100.0,
                    },
                    tracker: StateTracker::new(),
                    uptime,
                    removed: false,
                }
            })
            .await?;

        let record = entry.state.lock().await;
        let device = record.snapshot(now);
        info!("registered device {} ({}) as {} probe", device.id, device.address, entry.target.kind());
        self.publish(MonitorEvent::DeviceRegistered { device: device.clone() });
        Ok(device)
    }

    /// Remove a device, tombstoning its active alerts
    ///
    /// The id stays reserved until the removal events are published, so a
    /// re-registration under the same id is ordered after them.
    #[instrument(skip(self))]
    pub async fn deregister_device(&self, id: &str) -> MonitorResult<Device> {
        self.inner
            .registry
            .remove_with(id, |entry| async move {
                let mut record = entry.state.lock().await;
                record.removed = true;

                let now = Utc::now();
                let resolved = self.inner.alerts.write().await.resolve_device(id, now);
                for alert in resolved {
                    self.publish(MonitorEvent::AlertResolved { alert });
                }

                let device = record.snapshot(now);
                info!("deregistered device {id}");
                self.publish(MonitorEvent::DeviceRemoved {
                    device_id: id.to_string(),
                });
                device
            })
            .await
    }

    /// Enable or disable probing of a device
    pub async fn set_monitored(&self, id: &str, enabled: bool) -> MonitorResult<Device> {
        self.change_monitoring(id, |_| enabled).await
    }

    pub async fn toggle_monitoring(&self, id: &str) -> MonitorResult<Device> {
        self.change_monitoring(id, |current| !current).await
    }

    #[instrument(skip(self, decide))]
    async fn change_monitoring(&self, id: &str, decide: impl FnOnce(bool) -> bool) -> MonitorResult<Device> {
        let entry = self.inner.registry.get(id).await?;
        let mut record = entry.state.lock().await;
        let now = Utc::now();
        let enabled = decide(record.device.monitored);

        if record.device.monitored != enabled {
            record.device.monitored = enabled;
            if enabled {
                record.tracker.fence(now);
                let status = record.tracker.status();
                record.uptime.start(status, now);
            } else {
                record.uptime.pause(now);
            }
            debug!("monitoring {}", if enabled { "enabled" } else { "disabled" });
        }

        let device = record.snapshot(now);
        self.publish(MonitorEvent::DeviceUpdated { device: device.clone() });
        Ok(device)
    }

    pub async fn list_alerts(&self, filter: &AlertFilter) -> Vec<Alert> {
        self.inner.alerts.read().await.list(filter)
    }

    pub async fn get_alert(&self, id: AlertId) -> MonitorResult<Alert> {
        self.inner
            .alerts
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(MonitorError::AlertNotFound(id))
    }

    /// Manually resolve an alert (idempotent)
    #[instrument(skip(self))]
    pub async fn resolve_alert(&self, id: AlertId) -> MonitorResult<Alert> {
        let (alert, changed) = self.inner.alerts.write().await.resolve(id, Utc::now())?;
        if changed {
            self.publish(MonitorEvent::AlertResolved { alert: alert.clone() });
        }
        Ok(alert)
    }

    pub async fn get_stats(&self) -> NetworkStats {
        let devices = self.list_devices().await;
        let active = self.inner.alerts.read().await.active_count();
        NetworkStats::from_devices(&devices, active)
    }

    /// Fault log entries, newest first
    pub async fn list_fault_logs(&self, limit: usize) -> Vec<FaultLogEntry> {
        self.inner.alerts.read().await.fault_logs(limit)
    }

    /// Entries the scheduler should probe this tick
    pub(crate) async fn monitored_entries(&self) -> Vec<Arc<DeviceEntry>> {
        let mut monitored = Vec::new();
        for entry in self.inner.registry.entries().await {
            let record = entry.state.lock().await;
            if record.device.monitored && !record.removed {
                monitored.push(Arc::clone(&entry));
            }
        }
        monitored
    }

    /// Feed one measurement for a device
    pub async fn apply_measurement(&self, device_id: &str, measurement: Measurement) -> MonitorResult<ApplyOutcome> {
        let entry = self.inner.registry.get(device_id).await?;
        Ok(self.apply_to_entry(&entry, measurement).await)
    }

    #[instrument(skip(self, entry, measurement), fields(device = %entry.id))]
    pub(crate) async fn apply_to_entry(&self, entry: &DeviceEntry, measurement: Measurement) -> ApplyOutcome {
        let mut record = entry.state.lock().await;
        if record.removed || !record.device.monitored {
            trace!("discarding measurement");
            return ApplyOutcome::Discarded;
        }

        let observation = record
            .tracker
            .observe(&entry.id, &measurement, &self.inner.tracker_config);

        let transition = match observation {
            Observation::Stale => {
                debug!("ignoring stale measurement from {}", measurement.timestamp);
                return ApplyOutcome::Stale;
            }
            Observation::Pending { confirmations, required } => {
                debug!("recovery pending ({confirmations}/{required})");
                let device = record.snapshot(Utc::now());
                self.publish(MonitorEvent::DeviceUpdated { device });
                return ApplyOutcome::Pending;
            }
            Observation::Applied(transition) => transition,
        };

        let now = Utc::now();
        if let Some(transition) = &transition {
            info!("{} → {}", transition.from, transition.to);
            record.uptime.record(transition.to, transition.timestamp);

            let changes = self
                .inner
                .alerts
                .write()
                .await
                .on_transition(record.label(), transition, now);

            self.publish(MonitorEvent::Transition {
                transition: transition.clone(),
            });
            for alert in changes.resolved {
                self.publish(MonitorEvent::AlertResolved { alert });
            }
            if let Some(fault) = changes.fault {
                self.publish(MonitorEvent::FaultLogged { entry: fault });
            }
            if let Some(alert) = changes.opened {
                self.publish(MonitorEvent::AlertOpened { alert });
            }
        }

        let device = record.snapshot(now);
        self.publish(MonitorEvent::DeviceUpdated { device });
        ApplyOutcome::Applied(transition)
    }

    /// Seed the monitor from a persisted snapshot
    ///
    /// Devices whose address no longer parses, or whose id is already
    /// registered, are skipped with a warning. Active alerts are reconciled
    /// against the registered devices; the ones resolved on load are returned
    /// so they can be written back.
    #[instrument(skip_all, fields(devices = devices.len(), alerts = alerts.len()))]
    pub async fn restore(&self, devices: Vec<Device>, alerts: Vec<Alert>, fault_logs: Vec<FaultLogEntry>) -> Vec<Alert> {
        let now = Utc::now();
        let window = self.inner.uptime_window;

        for device in devices {
            let target = match ProbeTarget::parse(&device.address) {
                Ok(target) => target,
                Err(e) => {
                    warn!("skipping persisted device {}: {e}", device.id);
                    continue;
                }
            };

            let id = device.id.clone();
            let result = self
                .inner
                .registry
                .insert(Some(id.clone()), target, |_| restored_record(device, window, now))
                .await;
            if let Err(e) = result {
                warn!("skipping persisted device {id}: {e}");
            }
        }

        let mut statuses = HashMap::new();
        for entry in self.inner.registry.entries().await {
            let record = entry.state.lock().await;
            statuses.insert(entry.id.clone(), record.tracker.status());
        }
        info!("restored {} devices", statuses.len());

        self.inner
            .alerts
            .write()
            .await
            .restore(alerts, fault_logs, &statuses, now)
    }
}

fn restored_record(device: Device, window: UptimeWindow, now: DateTime<Utc>) -> DeviceRecord {
    let tracker = StateTracker::resume(device.status, device.latency_ms, device.last_checked);
    let mut uptime = UptimeLedger::new(window, Some(device.uptime));
    if device.monitored {
        uptime.start(device.status, now);
    }
    DeviceRecord {
        device,
        tracker,
        uptime,
        removed: false,
    }
}
