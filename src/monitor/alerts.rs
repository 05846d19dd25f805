//! Alert Manager
//!
//! Opens and resolves alerts from status transitions. At most one alert is
//! active per (device, fault kind); every fault-entering transition is also
//! appended to a bounded fault log.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::device::Status;
use super::tracker::Transition;
use crate::error::{MonitorError, MonitorResult};

/// Number of fault log entries kept in memory
pub const FAULT_LOG_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(pub u64);

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultKind {
    Connectivity,
    Latency,
}

impl FaultKind {
    /// The fault a status represents, if any
    pub fn for_status(status: Status) -> Option<Self> {
        match status {
            Status::Online => None,
            Status::Slow => Some(FaultKind::Latency),
            Status::Offline => Some(FaultKind::Connectivity),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::Connectivity => "connectivity",
            FaultKind::Latency => "latency",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FaultKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connectivity" => Ok(FaultKind::Connectivity),
            "latency" => Ok(FaultKind::Latency),
            other => Err(format!("unknown fault kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AlertStatus::Active),
            "resolved" => Ok(AlertStatus::Resolved),
            other => Err(format!("unknown alert status '{other}'")),
        }
    }
}

/// Why an alert was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The device left the fault state
    Recovered,
    /// Resolved through the API
    Manual,
    /// The device was deregistered
    DeviceRemoved,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Recovered => "recovered",
            Resolution::Manual => "manual",
            Resolution::DeviceRemoved => "device_removed",
        }
    }
}

impl std::str::FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recovered" => Ok(Resolution::Recovered),
            "manual" => Ok(Resolution::Manual),
            "device_removed" => Ok(Resolution::DeviceRemoved),
            other => Err(format!("unknown resolution '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: AlertId,
    pub device_id: String,
    pub device_name: String,
    pub device_address: String,
    pub kind: FaultKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub status: AlertStatus,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<Resolution>,
}

impl Alert {
    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }
}

/// One fault-entering transition, kept for the audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultLogEntry {
    pub id: u64,
    pub device_id: String,
    pub device_name: String,
    pub device_address: String,
    pub kind: FaultKind,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertFilter {
    #[serde(default)]
    pub status: Option<AlertStatus>,
    #[serde(default, alias = "device_id")]
    pub device_id: Option<String>,
}

impl AlertFilter {
    pub fn active() -> Self {
        Self {
            status: Some(AlertStatus::Active),
            device_id: None,
        }
    }

    fn matches(&self, alert: &Alert) -> bool {
        self.status.is_none_or(|s| s == alert.status)
            && self.device_id.as_deref().is_none_or(|id| id == alert.device_id)
    }
}

/// Denormalized device fields copied onto alerts and log entries
#[derive(Debug, Clone, Copy)]
pub struct DeviceLabel<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub address: &'a str,
}

/// Everything one transition changed, applied as a unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertChanges {
    pub resolved: Vec<Alert>,
    pub opened: Option<Alert>,
    pub fault: Option<FaultLogEntry>,
}

#[derive(Debug, Default)]
pub struct AlertManager {
    alerts: BTreeMap<AlertId, Alert>,
    active: HashMap<(String, FaultKind), AlertId>,
    fault_log: VecDeque<FaultLogEntry>,
    next_alert_id: u64,
    next_log_id: u64,
}

fn fault_message(kind: FaultKind, device: &DeviceLabel<'_>, latency_ms: Option<u64>) -> String {
    match (kind, latency_ms) {
        (FaultKind::Connectivity, _) => format!("Connection lost: {} is unreachable", device.name),
        (FaultKind::Latency, Some(ms)) => format!("High latency detected: {ms}ms on {}", device.name),
        (FaultKind::Latency, None) => format!("High latency detected on {}", device.name),
    }
}

impl AlertManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one transition
    ///
    /// Active alerts whose kind does not match the new state are resolved
    /// first, then the alert for the new state's fault is opened unless one
    /// is already active.
    pub fn on_transition(&mut self, device: DeviceLabel<'_>, transition: &Transition, now: DateTime<Utc>) -> AlertChanges {
        let mut changes = AlertChanges::default();
        let fault = FaultKind::for_status(transition.to);

        for kind in [FaultKind::Connectivity, FaultKind::Latency] {
            if Some(kind) == fault {
                continue;
            }
            if let Some(alert) = self.resolve_active(device.id, kind, Resolution::Recovered, now) {
                changes.resolved.push(alert);
            }
        }

        let Some(kind) = fault else {
            return changes;
        };

        let message = fault_message(kind, &device, transition.latency_ms);
        changes.fault = Some(self.log_fault(device, kind, &message, transition.timestamp));

        match self.open(device, kind, message, now) {
            Ok(alert) => changes.opened = Some(alert),
            Err(e) => warn!("{e}, coalescing onto the open alert"),
        }

        changes
    }

    fn open(&mut self, device: DeviceLabel<'_>, kind: FaultKind, message: String, now: DateTime<Utc>) -> MonitorResult<Alert> {
        let key = (device.id.to_string(), kind);
        if self.active.contains_key(&key) {
            return Err(MonitorError::DuplicateActiveAlert {
                device_id: key.0,
                kind,
            });
        }

        self.next_alert_id += 1;
        let alert = Alert {
            id: AlertId(self.next_alert_id),
            device_id: device.id.to_string(),
            device_name: device.name.to_string(),
            device_address: device.address.to_string(),
            kind,
            message,
            created_at: now,
            status: AlertStatus::Active,
            resolved_at: None,
            resolution: None,
        };

        info!("alert {} opened for {}: {}", alert.id, alert.device_id, alert.message);
        self.active.insert(key, alert.id);
        self.alerts.insert(alert.id, alert.clone());
        Ok(alert)
    }

    fn resolve_active(
        &mut self,
        device_id: &str,
        kind: FaultKind,
        resolution: Resolution,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let id = self.active.remove(&(device_id.to_string(), kind))?;
        let alert = self.alerts.get_mut(&id)?;
        alert.status = AlertStatus::Resolved;
        alert.resolved_at = Some(now);
        alert.resolution = Some(resolution);
        info!("alert {id} for {device_id} resolved ({})", resolution.as_str());
        Some(alert.clone())
    }

    fn log_fault(&mut self, device: DeviceLabel<'_>, kind: FaultKind, description: &str, at: DateTime<Utc>) -> FaultLogEntry {
        self.next_log_id += 1;
        let entry = FaultLogEntry {
            id: self.next_log_id,
            device_id: device.id.to_string(),
            device_name: device.name.to_string(),
            device_address: device.address.to_string(),
            kind,
            description: description.to_string(),
            timestamp: at,
        };
        self.push_log(entry.clone());
        entry
    }

    fn push_log(&mut self, entry: FaultLogEntry) {
        self.fault_log.push_back(entry);
        while self.fault_log.len() > FAULT_LOG_CAPACITY {
            self.fault_log.pop_front();
        }
    }

    /// Manually resolve an alert
    ///
    /// Returns the alert and whether it changed; resolving an already
    /// resolved alert is a no-op.
    pub fn resolve(&mut self, id: AlertId, now: DateTime<Utc>) -> MonitorResult<(Alert, bool)> {
        let alert = self.alerts.get(&id).ok_or(MonitorError::AlertNotFound(id))?;
        if !alert.is_active() {
            return Ok((alert.clone(), false));
        }

        let (device_id, kind) = (alert.device_id.clone(), alert.kind);
        let resolved = self
            .resolve_active(&device_id, kind, Resolution::Manual, now)
            .ok_or(MonitorError::AlertNotFound(id))?;
        Ok((resolved, true))
    }

    /// Tombstone every active alert of a removed device
    pub fn resolve_device(&mut self, device_id: &str, now: DateTime<Utc>) -> Vec<Alert> {
        [FaultKind::Connectivity, FaultKind::Latency]
            .into_iter()
            .filter_map(|kind| self.resolve_active(device_id, kind, Resolution::DeviceRemoved, now))
            .collect()
    }

    pub fn get(&self, id: AlertId) -> Option<&Alert> {
        self.alerts.get(&id)
    }

    /// Alerts matching the filter, newest first
    pub fn list(&self, filter: &AlertFilter) -> Vec<Alert> {
        self.alerts
            .values()
            .rev()
            .filter(|alert| filter.matches(alert))
            .cloned()
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Fault log entries, newest first
    pub fn fault_logs(&self, limit: usize) -> Vec<FaultLogEntry> {
        self.fault_log.iter().rev().take(limit).cloned().collect()
    }

    /// Seed from persisted alerts and log entries
    ///
    /// `statuses` holds the current status of every restored device. An
    /// active alert is resolved on load when its device is gone
    /// (`DeviceRemoved`), when its kind no longer matches the device status
    /// (`Recovered`), or when it duplicates an earlier active alert for the
    /// same (device, kind). Resolved alerts are returned for write-back.
    pub fn restore(
        &mut self,
        alerts: Vec<Alert>,
        mut logs: Vec<FaultLogEntry>,
        statuses: &HashMap<String, Status>,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let mut repaired = Vec::new();
        let mut alerts = alerts;
        alerts.sort_by_key(|a| a.id);

        for mut alert in alerts {
            self.next_alert_id = self.next_alert_id.max(alert.id.0);
            if alert.is_active() {
                let key = (alert.device_id.clone(), alert.kind);
                let resolution = match statuses.get(&alert.device_id) {
                    None => {
                        debug!("alert {} belongs to unknown device {}", alert.id, alert.device_id);
                        Some(Resolution::DeviceRemoved)
                    }
                    Some(&status) if FaultKind::for_status(status) != Some(alert.kind) => {
                        debug!("alert {} no longer matches {} status {status}", alert.id, alert.device_id);
                        Some(Resolution::Recovered)
                    }
                    Some(_) => match self.active.get(&key) {
                        Some(existing) => {
                            warn!(
                                "{}",
                                MonitorError::DuplicateActiveAlert {
                                    device_id: alert.device_id.clone(),
                                    kind: alert.kind,
                                }
                            );
                            debug!("keeping alert {existing}, resolving {}", alert.id);
                            Some(Resolution::Recovered)
                        }
                        None => None,
                    },
                };

                match resolution {
                    Some(resolution) => {
                        alert.status = AlertStatus::Resolved;
                        alert.resolved_at = Some(now);
                        alert.resolution = Some(resolution);
                        repaired.push(alert.clone());
                    }
                    None => {
                        self.active.insert(key, alert.id);
                    }
                }
            }
            self.alerts.insert(alert.id, alert);
        }

        logs.sort_by_key(|entry| (entry.timestamp, entry.id));
        for entry in logs {
            self.next_log_id = self.next_log_id.max(entry.id);
            self.push_log(entry);
        }

        if !repaired.is_empty() {
            info!("resolved {} stale alerts on restore", repaired.len());
        }
        repaired
    }

    /// Whether every (device, kind) has at most one active alert
    pub fn check_invariant(&self) -> bool {
        let mut seen = HashMap::new();
        for alert in self.alerts.values().filter(|a| a.is_active()) {
            if seen.insert((alert.device_id.as_str(), alert.kind), alert.id).is_some() {
                return false;
            }
        }
        seen.len() == self.active.len()
    }
}
