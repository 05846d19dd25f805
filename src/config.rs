use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tracing::trace;

use crate::actors::scheduler::SchedulerConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::monitor::device::DeviceSpec;
use crate::monitor::tracker::{DEFAULT_RECOVERY_CONFIRMATIONS, DEFAULT_SLOW_THRESHOLD_MS, TrackerConfig};
use crate::monitor::uptime::UptimeWindow;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorSettings,

    /// Devices registered at startup (skipped if already restored from storage)
    #[serde(default)]
    pub devices: Vec<DeviceSpec>,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiSettings,

    /// Notification target (optional - no notifications when absent)
    pub alert: Option<AlertConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,

    #[serde(default = "default_slow_threshold_ms")]
    pub slow_threshold_ms: u64,

    #[serde(default = "default_recovery_confirmations")]
    pub recovery_confirmations: u32,

    /// Trailing uptime window; `None` means since monitoring began
    #[serde(default)]
    pub uptime_window_secs: Option<u64>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            probe_timeout_ms: default_probe_timeout_ms(),
            max_concurrent_probes: default_max_concurrent_probes(),
            slow_threshold_ms: default_slow_threshold_ms(),
            recovery_confirmations: default_recovery_confirmations(),
            uptime_window_secs: None,
        }
    }
}

fn default_tick_interval_secs() -> u64 {
    5
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_max_concurrent_probes() -> usize {
    10
}

fn default_slow_threshold_ms() -> u64 {
    DEFAULT_SLOW_THRESHOLD_MS
}

fn default_recovery_confirmations() -> u32 {
    DEFAULT_RECOVERY_CONFIRMATIONS
}

/// Validated monitor settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedMonitorSettings {
    pub scheduler: SchedulerConfig,
    pub tracker: TrackerConfig,
    pub uptime_window: UptimeWindow,
}

impl MonitorSettings {
    pub fn resolve(&self) -> MonitorResult<ResolvedMonitorSettings> {
        let scheduler = SchedulerConfig {
            tick_interval: Duration::from_secs(self.tick_interval_secs),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            max_concurrent_probes: self.max_concurrent_probes,
        };
        scheduler.validate()?;

        if self.recovery_confirmations == 0 {
            return Err(MonitorError::InvalidConfig(
                "recovery_confirmations must be at least 1".into(),
            ));
        }

        Ok(ResolvedMonitorSettings {
            scheduler,
            tracker: TrackerConfig {
                slow_threshold_ms: self.slow_threshold_ms,
                recovery_confirmations: self.recovery_confirmations,
            },
            uptime_window: UptimeWindow::from_secs(self.uptime_window_secs),
        })
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory only (no persistence)
    #[serde(rename = "none")]
    None,

    Sqlite {
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,

        #[serde(default = "default_flush_interval_secs")]
        flush_interval_secs: u64,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./netguard.db")
}

fn default_flush_interval_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "crate::util::default_api_addr")]
    pub bind_addr: SocketAddr,

    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind_addr: crate::util::default_api_addr(),
            enable_cors: default_enable_cors(),
        }
    }
}

fn default_enable_cors() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertConfig {
    Discord(Discord),
    Webhook(Webhook),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Webhook {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Discord {
    pub url: String,
    pub user_id: Option<String>,
}

pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let file_content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_config(&file_content).with_context(|| format!("invalid configuration file {}", path.display()))
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    serde_json::from_str::<Config>(content)
        .map_err(anyhow::Error::from)
        .inspect(|config| trace!("loaded config: {config:?}"))
}
