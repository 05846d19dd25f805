//! Probe Executor - bounded reachability/latency checks
//!
//! A device address is parsed once, at registration, into a [`ProbeTarget`].
//! The [`ProbeExecutor`] runs one check against a target and always returns a
//! [`Measurement`]: timeouts and transport failures become
//! `reachable == false`, never an error.
//!
//! ## Target kinds
//!
//! ```text
//! http://host/path, https://...   → HTTP GET (any response is reachable)
//! host:port, 10.0.0.1:22, [::1]:80 → TCP connect
//! 10.0.0.1, ::1, router.lan        → ICMP echo via the system `ping`
//! ```

mod http;
mod ping;
mod tcp;

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{instrument, trace};

use crate::error::{MonitorError, MonitorResult};

pub use http::HttpProber;
pub use ping::PingProber;
pub use tcp::TcpProber;

/// Probe-level failure
///
/// Only used between a [`Prober`] and the [`ProbeExecutor`]; the executor
/// folds every variant into an unreachable [`Measurement`].
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("target unreachable: {0}")]
    Unreachable(String),
    #[error("probe command failed: {0}")]
    Command(String),
}

/// A validated, probe-ready device address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeTarget {
    /// ICMP echo against an IP address or hostname
    Icmp { host: String },

    /// TCP connect against host and port
    Tcp { host: String, port: u16 },

    /// HTTP(S) request against a URL
    Http { url: reqwest::Url },
}

fn hostname_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*\.?$",
        )
        .expect("hostname pattern is valid")
    })
}

/// Valid DNS name. All-digit dotted strings only reach this point when they
/// failed to parse as an IP, so they are malformed addresses, not hostnames.
fn is_hostname(candidate: &str) -> bool {
    let numeric = candidate.chars().all(|c| c.is_ascii_digit() || c == '.');
    !numeric && candidate.len() <= 253 && hostname_regex().is_match(candidate)
}

impl ProbeTarget {
    /// Parse and validate a device address
    pub fn parse(address: &str) -> MonitorResult<Self> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(MonitorError::invalid_address(address, "address is empty"));
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            let url = reqwest::Url::parse(trimmed)
                .map_err(|e| MonitorError::invalid_address(address, e.to_string()))?;
            if url.host_str().is_none() {
                return Err(MonitorError::invalid_address(address, "URL has no host"));
            }
            return Ok(ProbeTarget::Http { url });
        }

        if trimmed.contains("://") {
            return Err(MonitorError::invalid_address(
                address,
                "only http and https URLs are supported",
            ));
        }

        if let Ok(ip) = trimmed.parse::<IpAddr>() {
            return Ok(ProbeTarget::Icmp {
                host: ip.to_string(),
            });
        }

        if let Ok(socket) = trimmed.parse::<SocketAddr>() {
            return Ok(ProbeTarget::Tcp {
                host: socket.ip().to_string(),
                port: socket.port(),
            });
        }

        if let Some((host, port)) = trimmed.rsplit_once(':') {
            let port = port
                .parse::<u16>()
                .map_err(|_| MonitorError::invalid_address(address, "port is not a number"))?;
            if port == 0 {
                return Err(MonitorError::invalid_address(address, "port 0 is not probeable"));
            }
            if !is_hostname(host) {
                return Err(MonitorError::invalid_address(address, "malformed hostname"));
            }
            return Ok(ProbeTarget::Tcp {
                host: host.to_string(),
                port,
            });
        }

        if is_hostname(trimmed) {
            return Ok(ProbeTarget::Icmp {
                host: trimmed.to_string(),
            });
        }

        Err(MonitorError::invalid_address(
            address,
            "not an IP address, hostname, host:port or http(s) URL",
        ))
    }

    /// Short name of the probe kind (for logs)
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeTarget::Icmp { .. } => "icmp",
            ProbeTarget::Tcp { .. } => "tcp",
            ProbeTarget::Http { .. } => "http",
        }
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeTarget::Icmp { host } => write!(f, "{host}"),
            ProbeTarget::Tcp { host, port } if host.contains(':') => write!(f, "[{host}]:{port}"),
            ProbeTarget::Tcp { host, port } => write!(f, "{host}:{port}"),
            ProbeTarget::Http { url } => write!(f, "{url}"),
        }
    }
}

/// One reachability/latency sample
///
/// Produced by the executor and consumed once by the state tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    /// The probed address
    pub address: String,

    /// Whether the target answered within the timeout
    pub reachable: bool,

    /// Round-trip time in milliseconds (`None` when unreachable)
    pub latency_ms: Option<u64>,

    /// When the probe was dispatched
    pub timestamp: DateTime<Utc>,
}

impl Measurement {
    pub fn reachable(address: impl Into<String>, latency_ms: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            address: address.into(),
            reachable: true,
            latency_ms: Some(latency_ms),
            timestamp,
        }
    }

    pub fn unreachable(address: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            address: address.into(),
            reachable: false,
            latency_ms: None,
            timestamp,
        }
    }
}

/// A single network check
///
/// Implementations must be safe to call concurrently for different targets.
/// They do not need to enforce the timeout themselves (the executor does),
/// but the hint lets them configure underlying tools.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe the target, returning the round-trip time on success
    async fn probe(&self, target: &ProbeTarget, timeout: Duration) -> Result<Duration, ProbeError>;
}

/// Dispatches each target kind to the matching real prober
pub struct NetworkProber {
    ping: PingProber,
    tcp: TcpProber,
    http: HttpProber,
}

impl NetworkProber {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            ping: PingProber::new(),
            tcp: TcpProber,
            http: HttpProber::new()?,
        })
    }
}

#[async_trait]
impl Prober for NetworkProber {
    async fn probe(&self, target: &ProbeTarget, timeout: Duration) -> Result<Duration, ProbeError> {
        match target {
            ProbeTarget::Icmp { .. } => self.ping.probe(target, timeout).await,
            ProbeTarget::Tcp { .. } => self.tcp.probe(target, timeout).await,
            ProbeTarget::Http { .. } => self.http.probe(target, timeout).await,
        }
    }
}

/// Runs probes with a hard deadline
#[derive(Clone)]
pub struct ProbeExecutor {
    prober: Arc<dyn Prober>,
}

impl ProbeExecutor {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self { prober }
    }

    /// Probe a target, never blocking past `timeout`
    ///
    /// The measurement is stamped with the dispatch time. When the deadline
    /// elapses the probe future is dropped, so a late answer can never be
    /// observed.
    #[instrument(skip(self, target), fields(target = %target, kind = target.kind()))]
    pub async fn probe(&self, target: &ProbeTarget, timeout: Duration) -> Measurement {
        let dispatched_at = Utc::now();
        let address = target.to_string();
        let start = Instant::now();

        match tokio::time::timeout(timeout, self.prober.probe(target, timeout)).await {
            Ok(Ok(rtt)) if rtt < timeout => {
                let latency_ms = rtt.as_millis() as u64;
                trace!("reachable in {latency_ms}ms");
                Measurement::reachable(address, latency_ms, dispatched_at)
            }
            Ok(Ok(rtt)) => {
                trace!("answer after {rtt:?} exceeds timeout, treating as unreachable");
                Measurement::unreachable(address, dispatched_at)
            }
            Ok(Err(e)) => {
                trace!("unreachable after {:?}: {e}", start.elapsed());
                Measurement::unreachable(address, dispatched_at)
            }
            Err(_) => {
                trace!("timed out after {timeout:?}");
                Measurement::unreachable(address, dispatched_at)
            }
        }
    }
}
