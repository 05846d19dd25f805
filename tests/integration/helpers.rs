//! Helper types and functions for integration tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use netguard::{
    DeviceSpec, Measurement,
    actors::scheduler::SchedulerConfig,
    probe::{ProbeError, ProbeTarget, Prober},
};

/// Scripted answer for one probe
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Up(u64),
    Down,
}

/// Answers from a per-address script, falling back to a default once the
/// script is exhausted
pub struct ScriptedProber {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Reply,
    calls: AtomicUsize,
}

impl ScriptedProber {
    pub fn new(fallback: Reply) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn script(self, address: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(address.to_string(), replies.into_iter().collect());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, target: &ProbeTarget, _timeout: Duration) -> Result<Duration, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&target.to_string())
            .and_then(|script| script.pop_front())
            .unwrap_or(self.fallback);

        match reply {
            Reply::Up(ms) => Ok(Duration::from_millis(ms)),
            Reply::Down => Err(ProbeError::Unreachable(target.to_string())),
        }
    }
}

/// Sleeps for `delay` per probe and records peak concurrency
pub struct CountingProber {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    per_target: Mutex<HashMap<String, usize>>,
}

impl CountingProber {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            per_target: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls_per_target(&self) -> HashMap<String, usize> {
        self.per_target.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prober for CountingProber {
    async fn probe(&self, target: &ProbeTarget, _timeout: Duration) -> Result<Duration, ProbeError> {
        *self.per_target.lock().unwrap().entry(target.to_string()).or_default() += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(Duration::from_millis(3))
    }
}

/// Long tick so only explicit `tick_now` calls probe during a test
pub fn manual_scheduler_config(max_concurrent_probes: usize) -> SchedulerConfig {
    SchedulerConfig {
        tick_interval: Duration::from_secs(3600),
        probe_timeout: Duration::from_millis(800),
        max_concurrent_probes,
    }
}

pub fn device(id: &str, address: &str) -> DeviceSpec {
    DeviceSpec::new(address).with_id(id).with_name(format!("Device {id}"))
}

/// Measurement timestamps relative to the moment the test started
pub struct Timeline(DateTime<Utc>);

impl Timeline {
    pub fn new() -> Self {
        Self(Utc::now())
    }

    pub fn at(&self, secs: i64) -> DateTime<Utc> {
        self.0 + chrono::Duration::seconds(secs)
    }

    pub fn up(&self, address: &str, latency_ms: u64, secs: i64) -> Measurement {
        Measurement::reachable(address, latency_ms, self.at(secs))
    }

    pub fn down(&self, address: &str, secs: i64) -> Measurement {
        Measurement::unreachable(address, self.at(secs))
    }
}
