//! ICMP reachability through the system `ping` command
//!
//! Raw ICMP sockets need elevated privileges, the `ping` binary does not.
//! One echo request is sent; latency is parsed from the per-packet
//! `time=X ms` line, falling back to the `rtt/round-trip min/avg/max`
//! summary.

use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::trace;

use super::{ProbeError, ProbeTarget, Prober};

/// Latency reported when the command succeeds but prints no timing
const FALLBACK_LATENCY: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct PingProber {
    program: String,
}

impl PingProber {
    pub fn new() -> Self {
        Self {
            program: "ping".to_string(),
        }
    }

    /// Use a different ping binary (e.g. `ping6` or an absolute path)
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(host: &str, timeout: Duration) -> Vec<String> {
        if cfg!(windows) {
            let millis = timeout.as_millis().max(1);
            vec![
                "-n".into(),
                "1".into(),
                "-w".into(),
                millis.to_string(),
                host.into(),
            ]
        } else {
            let secs = timeout.as_secs().max(1);
            vec![
                "-c".into(),
                "1".into(),
                "-W".into(),
                secs.to_string(),
                host.into(),
            ]
        }
    }
}

impl Default for PingProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prober for PingProber {
    async fn probe(&self, target: &ProbeTarget, timeout: Duration) -> Result<Duration, ProbeError> {
        let ProbeTarget::Icmp { host } = target else {
            return Err(ProbeError::Command(format!(
                "ping cannot probe {} target {target}",
                target.kind()
            )));
        };

        let output = Command::new(&self.program)
            .args(Self::args(host, timeout))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProbeError::Command(format!("failed to execute {}: {e}", self.program)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            if stdout.contains("100% packet loss") || stdout.contains("100.0% packet loss") {
                return Err(ProbeError::Timeout(timeout));
            }
            return Err(ProbeError::Unreachable(format!(
                "ping exited with {}",
                output.status
            )));
        }

        let latency = parse_ping_output(&stdout).unwrap_or(FALLBACK_LATENCY);
        trace!("ping {host}: {latency:?}");
        Ok(latency)
    }
}

/// Extract the round-trip time from ping output
pub(crate) fn parse_ping_output(output: &str) -> Option<Duration> {
    static PER_PACKET: OnceLock<Regex> = OnceLock::new();
    static SUMMARY: OnceLock<Regex> = OnceLock::new();

    let per_packet = PER_PACKET.get_or_init(|| {
        Regex::new(r"(?i)time[=<]\s*(?P<val>[0-9.]+)\s*ms").expect("per-packet pattern is valid")
    });
    let summary = SUMMARY.get_or_init(|| {
        Regex::new(r"(?:rtt|round-trip)\s+min/avg/max/(?:mdev|stddev)\s*=\s*[0-9.]+/(?P<avg>[0-9.]+)/")
            .expect("summary pattern is valid")
    });

    let millis = per_packet
        .captures(output)
        .and_then(|caps| caps.name("val"))
        .or_else(|| summary.captures(output).and_then(|caps| caps.name("avg")))
        .and_then(|m| m.as_str().parse::<f64>().ok())?;

    (millis.is_finite() && millis >= 0.0).then(|| Duration::from_micros((millis * 1000.0).round() as u64))
}
