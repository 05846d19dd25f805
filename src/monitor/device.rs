//! Device records and derived projections

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable, derived status of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Online,
    Slow,
    Offline,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Online => "online",
            Status::Slow => "slow",
            Status::Offline => "offline",
        }
    }

    /// Whether time spent in this status counts as available
    pub fn is_available(&self) -> bool {
        !matches!(self, Status::Offline)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Status::Online),
            "slow" => Ok(Status::Slow),
            "offline" => Ok(Status::Offline),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// Kind of device (open enumeration)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    #[default]
    Server,
    Router,
    Switch,
    Workstation,
    #[serde(untagged)]
    Other(String),
}

impl DeviceClass {
    pub fn as_str(&self) -> &str {
        match self {
            DeviceClass::Server => "server",
            DeviceClass::Router => "router",
            DeviceClass::Switch => "switch",
            DeviceClass::Workstation => "workstation",
            DeviceClass::Other(other) => other,
        }
    }
}

impl From<&str> for DeviceClass {
    fn from(value: &str) -> Self {
        match value {
            "server" => DeviceClass::Server,
            "router" => DeviceClass::Router,
            "switch" => DeviceClass::Switch,
            "workstation" => DeviceClass::Workstation,
            other => DeviceClass::Other(other.to_string()),
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monitored network endpoint, as exposed to the API layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Unique, stable identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Network address as registered
    #[serde(alias = "ip")]
    pub address: String,

    /// Device class
    #[serde(rename = "type")]
    pub class: DeviceClass,

    /// Whether the scheduler probes this device
    pub monitored: bool,

    /// Current derived status
    pub status: Status,

    /// Latency of the measurement that set the status (`None` = unreachable)
    pub latency_ms: Option<u64>,

    /// When the last measurement was applied
    pub last_checked: Option<DateTime<Utc>>,

    /// Rolling availability percentage (0-100)
    pub uptime: f64,
}

/// Registration request for a new device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSpec {
    /// Identifier; generated when absent
    #[serde(default)]
    pub id: Option<String>,

    /// Display name; defaults to the address
    #[serde(default)]
    pub name: Option<String>,

    #[serde(alias = "ip")]
    pub address: String,

    #[serde(default, rename = "type", alias = "class")]
    pub class: DeviceClass,

    #[serde(default = "default_monitored", alias = "isMonitored")]
    pub monitored: bool,
}

fn default_monitored() -> bool {
    true
}

impl DeviceSpec {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            id: None,
            name: None,
            address: address.into(),
            class: DeviceClass::default(),
            monitored: true,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_class(mut self, class: DeviceClass) -> Self {
        self.class = class;
        self
    }

    pub fn unmonitored(mut self) -> Self {
        self.monitored = false;
        self
    }
}

/// Counts of devices by status plus active alerts
///
/// Status buckets only count monitored devices; devices with monitoring
/// disabled are reported under `unmonitored`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub total_devices: usize,
    pub online: usize,
    pub slow: usize,
    pub offline: usize,
    pub unmonitored: usize,
    pub active_alerts: usize,
}

impl NetworkStats {
    pub fn from_devices<'a>(devices: impl IntoIterator<Item = &'a Device>, active_alerts: usize) -> Self {
        let mut stats = NetworkStats {
            active_alerts,
            ..Default::default()
        };

        for device in devices {
            stats.total_devices += 1;
            if !device.monitored {
                stats.unmonitored += 1;
                continue;
            }
            match device.status {
                Status::Online => stats.online += 1,
                Status::Slow => stats.slow += 1,
                Status::Offline => stats.offline += 1,
            }
        }

        stats
    }
}
