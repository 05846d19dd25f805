//! State Tracker - per-device status machine
//!
//! Converts raw measurements into a stable [`Status`]:
//!
//! ```text
//! unreachable                      → offline
//! reachable, latency > threshold   → slow
//! reachable, latency <= threshold  → online
//! ```
//!
//! Leaving `offline` requires `recovery_confirmations` consecutive
//! non-offline measurements. Until then the device stays offline and the
//! measurement is reported as [`Observation::Pending`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device::Status;
use crate::probe::Measurement;

pub const DEFAULT_SLOW_THRESHOLD_MS: u64 = 150;
pub const DEFAULT_RECOVERY_CONFIRMATIONS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Latency above this is `slow` (exclusive on the slow side)
    pub slow_threshold_ms: u64,

    /// Consecutive non-offline measurements needed to leave `offline`
    pub recovery_confirmations: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            slow_threshold_ms: DEFAULT_SLOW_THRESHOLD_MS,
            recovery_confirmations: DEFAULT_RECOVERY_CONFIRMATIONS,
        }
    }
}

/// Classify a single measurement, ignoring hysteresis
pub fn classify(measurement: &Measurement, slow_threshold_ms: u64) -> Status {
    match (measurement.reachable, measurement.latency_ms) {
        (false, _) | (true, None) => Status::Offline,
        (true, Some(latency)) if latency > slow_threshold_ms => Status::Slow,
        (true, Some(_)) => Status::Online,
    }
}

/// A change in a device's derived status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub device_id: String,
    pub from: Status,
    pub to: Status,

    /// Latency of the measurement that caused the change
    pub latency_ms: Option<u64>,

    /// Timestamp of the measurement that caused the change
    pub timestamp: DateTime<Utc>,
}

/// Outcome of feeding one measurement to the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The measurement was applied; `Some` when the status changed
    Applied(Option<Transition>),

    /// A recovery from offline is awaiting more confirmations
    Pending { confirmations: u32, required: u32 },

    /// Older than the last applied measurement, ignored
    Stale,
}

#[derive(Debug, Clone)]
pub struct StateTracker {
    status: Status,
    latency_ms: Option<u64>,
    last_checked: Option<DateTime<Utc>>,
    last_applied: Option<DateTime<Utc>>,
    recovery_streak: u32,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::resume(Status::Online, None, None)
    }

    /// Start from a previously persisted state
    pub fn resume(status: Status, latency_ms: Option<u64>, last_checked: Option<DateTime<Utc>>) -> Self {
        Self {
            status,
            latency_ms,
            last_checked,
            last_applied: last_checked,
            recovery_streak: 0,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn latency_ms(&self) -> Option<u64> {
        self.latency_ms
    }

    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        self.last_checked
    }

    /// Mark everything dispatched before `at` as stale
    ///
    /// Used when monitoring is re-enabled so probes launched before the
    /// pause cannot land afterwards.
    pub fn fence(&mut self, at: DateTime<Utc>) {
        if self.last_applied.is_none_or(|last| last < at) {
            self.last_applied = Some(at);
        }
        self.recovery_streak = 0;
    }

    pub fn observe(&mut self, device_id: &str, measurement: &Measurement, config: &TrackerConfig) -> Observation {
        if self.last_applied.is_some_and(|last| measurement.timestamp < last) {
            return Observation::Stale;
        }
        self.last_applied = Some(measurement.timestamp);
        self.last_checked = Some(measurement.timestamp);

        let candidate = classify(measurement, config.slow_threshold_ms);

        if self.status == Status::Offline && candidate != Status::Offline {
            self.recovery_streak += 1;
            let required = config.recovery_confirmations.max(1);
            if self.recovery_streak < required {
                return Observation::Pending {
                    confirmations: self.recovery_streak,
                    required,
                };
            }
        }
        self.recovery_streak = 0;

        self.latency_ms = measurement.latency_ms.filter(|_| measurement.reachable);

        if candidate == self.status {
            return Observation::Applied(None);
        }

        let transition = Transition {
            device_id: device_id.to_string(),
            from: self.status,
            to: candidate,
            latency_ms: self.latency_ms,
            timestamp: measurement.timestamp,
        };
        self.status = candidate;
        Observation::Applied(Some(transition))
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}
