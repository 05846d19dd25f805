//! Device Registry
//!
//! The map itself sits behind an `RwLock` that is only held to insert,
//! remove or snapshot entries. A removal keeps it until the removed device
//! is finalised. Each device's mutable state has its own mutex, so
//! measurements for different devices never contend.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use super::alerts::DeviceLabel;
use super::device::Device;
use super::tracker::StateTracker;
use super::uptime::UptimeLedger;
use crate::error::{MonitorError, MonitorResult};
use crate::probe::ProbeTarget;

/// Mutable per-device state, guarded by [`DeviceEntry::state`]
#[derive(Debug)]
pub struct DeviceRecord {
    pub device: Device,
    pub tracker: StateTracker,
    pub uptime: UptimeLedger,

    /// Set once the device is deregistered; late measurements check it
    pub removed: bool,
}

impl DeviceRecord {
    /// The device as seen by readers, with uptime computed at `now`
    pub fn snapshot(&self, now: DateTime<Utc>) -> Device {
        let mut device = self.device.clone();
        device.status = self.tracker.status();
        device.latency_ms = self.tracker.latency_ms();
        device.last_checked = self.tracker.last_checked();
        device.uptime = self.uptime.percentage(now);
        device
    }

    pub fn label(&self) -> DeviceLabel<'_> {
        DeviceLabel {
            id: &self.device.id,
            name: &self.device.name,
            address: &self.device.address,
        }
    }
}

#[derive(Debug)]
pub struct DeviceEntry {
    pub id: String,
    pub target: ProbeTarget,

    /// Registration order
    seq: u64,

    in_flight: AtomicBool,
    pub state: Mutex<DeviceRecord>,
}

impl DeviceEntry {
    /// Claim the device for one probe; `None` while a probe is in flight
    pub fn try_begin_probe(self: &Arc<Self>) -> Option<InFlightGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard { entry: Arc::clone(self) })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Clears the in-flight flag when dropped
#[derive(Debug)]
pub struct InFlightGuard {
    entry: Arc<DeviceEntry>,
}

impl InFlightGuard {
    pub fn entry(&self) -> &Arc<DeviceEntry> {
        &self.entry
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.entry.in_flight.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, Arc<DeviceEntry>>>,
    next_seq: AtomicU64,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new device, generating `device-{n}` when no id is given
    pub async fn insert(
        &self,
        id: Option<String>,
        target: ProbeTarget,
        build: impl FnOnce(&str) -> DeviceRecord,
    ) -> MonitorResult<Arc<DeviceEntry>> {
        let mut devices = self.devices.write().await;

        let id = match id {
            Some(id) if devices.contains_key(&id) => return Err(MonitorError::DuplicateDevice(id)),
            Some(id) => id,
            None => loop {
                let candidate = format!("device-{}", self.next_seq.load(Ordering::Relaxed) + 1);
                if !devices.contains_key(&candidate) {
                    break candidate;
                }
                self.next_seq.fetch_add(1, Ordering::Relaxed);
            },
        };

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = Arc::new(DeviceEntry {
            state: Mutex::new(build(&id)),
            id: id.clone(),
            target,
            seq,
            in_flight: AtomicBool::new(false),
        });

        devices.insert(id, Arc::clone(&entry));
        Ok(entry)
    }

    /// Remove a device and run `finish` on it before the map is unlocked
    pub async fn remove_with<F, Fut, T>(&self, id: &str, finish: F) -> MonitorResult<T>
    where
        F: FnOnce(Arc<DeviceEntry>) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut devices = self.devices.write().await;
        let entry = devices
            .remove(id)
            .ok_or_else(|| MonitorError::DeviceNotFound(id.to_string()))?;
        Ok(finish(entry).await)
    }

    pub async fn get(&self, id: &str) -> MonitorResult<Arc<DeviceEntry>> {
        self.devices
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| MonitorError::DeviceNotFound(id.to_string()))
    }

    /// All entries in registration order
    pub async fn entries(&self) -> Vec<Arc<DeviceEntry>> {
        let mut entries: Vec<_> = self.devices.read().await.values().cloned().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }
}
