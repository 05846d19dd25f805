//! HTTP(S) probe implementation

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;

use super::{ProbeError, ProbeTarget, Prober};

/// Measures the time until response headers arrive
///
/// Any HTTP status counts as reachable: the device answered.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("failed to build HTTP probe client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, target: &ProbeTarget, timeout: Duration) -> Result<Duration, ProbeError> {
        let ProbeTarget::Http { url } = target else {
            return Err(ProbeError::Command(format!(
                "http cannot probe {} target {target}",
                target.kind()
            )));
        };

        let start = Instant::now();
        self.client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout(timeout)
                } else {
                    ProbeError::Unreachable(e.to_string())
                }
            })?;

        Ok(start.elapsed())
    }
}
