//! TCP connect probe

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpStream;

use super::{ProbeError, ProbeTarget, Prober};

/// Measures the time to complete a TCP handshake
///
/// A refused connection counts as unreachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProber;

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, target: &ProbeTarget, timeout: Duration) -> Result<Duration, ProbeError> {
        let ProbeTarget::Tcp { host, port } = target else {
            return Err(ProbeError::Command(format!(
                "tcp cannot probe {} target {target}",
                target.kind()
            )));
        };

        let start = Instant::now();
        let connect = TcpStream::connect((host.as_str(), *port));

        match tokio::time::timeout(timeout, connect).await {
            Ok(Ok(_stream)) => Ok(start.elapsed()),
            Ok(Err(e)) => Err(ProbeError::Unreachable(e.to_string())),
            Err(_) => Err(ProbeError::Timeout(timeout)),
        }
    }
}
