//! SchedulerActor - drives periodic probing of every monitored device
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → snapshot monitored devices → probe (≤ cap in flight) → apply_measurement
//!     ↑                                         each device independently, out of order
//!     └─── Commands (TickNow, UpdateInterval, Shutdown)
//! ```
//!
//! A tick never waits for the previous one. A device whose probe from an
//! earlier tick is still running is skipped, so each device has at most one
//! probe in flight.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::BoxFuture;
use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, instrument, trace, warn};

use super::messages::{SchedulerCommand, TickReport};
use crate::error::{MonitorError, MonitorResult};
use crate::monitor::{ApplyOutcome, NetworkMonitor};
use crate::probe::ProbeExecutor;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_CONCURRENT_PROBES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub probe_timeout: Duration,
    pub max_concurrent_probes: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            max_concurrent_probes: DEFAULT_MAX_CONCURRENT_PROBES,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> MonitorResult<()> {
        if self.tick_interval.is_zero() {
            return Err(MonitorError::InvalidConfig("tick interval must be positive".into()));
        }
        if self.probe_timeout.is_zero() {
            return Err(MonitorError::InvalidConfig("probe timeout must be positive".into()));
        }
        if self.probe_timeout >= self.tick_interval {
            return Err(MonitorError::InvalidConfig(format!(
                "probe timeout ({:?}) must be shorter than the tick interval ({:?})",
                self.probe_timeout, self.tick_interval
            )));
        }
        if self.max_concurrent_probes == 0 {
            return Err(MonitorError::InvalidConfig(
                "at least one concurrent probe is required".into(),
            ));
        }
        Ok(())
    }
}

/// What a single probe task did with its measurement
enum ProbeResult {
    Outcome { reachable: bool, outcome: ApplyOutcome },
    Failed,
}

pub struct SchedulerActor {
    monitor: NetworkMonitor,
    executor: ProbeExecutor,
    config: SchedulerConfig,

    /// Shared across ticks so the cap holds even when ticks overlap
    permits: Arc<Semaphore>,

    command_rx: mpsc::Receiver<SchedulerCommand>,
    tick_count: u64,
}

impl SchedulerActor {
    pub fn new(
        monitor: NetworkMonitor,
        executor: ProbeExecutor,
        config: SchedulerConfig,
        command_rx: mpsc::Receiver<SchedulerCommand>,
    ) -> Self {
        Self {
            monitor,
            executor,
            permits: Arc::new(Semaphore::new(config.max_concurrent_probes)),
            config,
            command_rx,
            tick_count: 0,
        }
    }

    fn ticker(&self) -> tokio::time::Interval {
        let mut ticker = interval_at(Instant::now() + self.config.tick_interval, self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    #[instrument(skip(self), fields(interval = ?self.config.tick_interval, cap = self.config.max_concurrent_probes))]
    pub async fn run(mut self) {
        debug!("starting scheduler actor");

        let mut ticker = self.ticker();
        // one driver per tick still draining; dropping it aborts its probes
        let mut drivers: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let tick = self.dispatch_tick().await;
                    drivers.spawn(async move {
                        let report = tick.await;
                        debug!(
                            "tick {} done: {} dispatched, {} skipped, {} transitions",
                            report.tick, report.dispatched, report.skipped, report.transitions
                        );
                    });
                }

                Some(_) = drivers.join_next(), if !drivers.is_empty() => {}

                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        warn!("command channel closed, shutting down");
                        break;
                    };

                    match cmd {
                        SchedulerCommand::TickNow { respond_to } => {
                            debug!("received TickNow command");
                            let tick = self.dispatch_tick().await;
                            drivers.spawn(async move {
                                let _ = respond_to.send(tick.await);
                            });
                        }

                        SchedulerCommand::UpdateInterval { interval, respond_to } => {
                            let candidate = SchedulerConfig {
                                tick_interval: interval,
                                ..self.config
                            };
                            let result = candidate.validate();
                            if result.is_ok() {
                                debug!("updating tick interval to {interval:?}");
                                self.config = candidate;
                                ticker = self.ticker();
                            }
                            let _ = respond_to.send(result);
                        }

                        SchedulerCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }
            }
        }

        drivers.abort_all();
        debug!("scheduler actor stopped");
    }

    /// Launch one probe per eligible device
    ///
    /// Probes start immediately (subject to the permit pool); the returned
    /// future resolves to the report once every probe of this tick is applied.
    async fn dispatch_tick(&mut self) -> BoxFuture<'static, TickReport> {
        self.tick_count += 1;
        let mut report = TickReport {
            tick: self.tick_count,
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        let mut probes = JoinSet::new();
        for entry in self.monitor.monitored_entries().await {
            let Some(guard) = entry.try_begin_probe() else {
                debug!("skipping {}: previous probe still in flight", entry.id);
                report.skipped += 1;
                continue;
            };

            let monitor = self.monitor.clone();
            let executor = self.executor.clone();
            let permits = Arc::clone(&self.permits);
            let timeout = self.config.probe_timeout;

            probes.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return ProbeResult::Failed;
                };
                let entry = guard.entry();
                let measurement = executor.probe(&entry.target, timeout).await;
                let reachable = measurement.reachable;
                let outcome = monitor.apply_to_entry(entry, measurement).await;
                ProbeResult::Outcome { reachable, outcome }
            });
            report.dispatched += 1;
        }

        trace!("tick {} dispatched {} probes", report.tick, report.dispatched);

        Box::pin(async move {
            while let Some(joined) = probes.join_next().await {
                match joined {
                    Ok(ProbeResult::Outcome { reachable, outcome }) => {
                        if !reachable {
                            report.unreachable += 1;
                        }
                        match outcome {
                            ApplyOutcome::Applied(transition) => {
                                report.applied += 1;
                                if transition.is_some() {
                                    report.transitions += 1;
                                }
                            }
                            ApplyOutcome::Pending => report.applied += 1,
                            ApplyOutcome::Stale => report.stale += 1,
                            ApplyOutcome::Discarded => report.discarded += 1,
                        }
                    }
                    Ok(ProbeResult::Failed) => report.failed += 1,
                    Err(e) => {
                        error!("probe task failed: {e}");
                        report.failed += 1;
                    }
                }
            }
            report
        })
    }
}

/// Handle for controlling a SchedulerActor
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Spawn the scheduler; the first periodic tick fires after one interval
    pub fn spawn(monitor: NetworkMonitor, executor: ProbeExecutor, config: SchedulerConfig) -> MonitorResult<Self> {
        config.validate()?;
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SchedulerActor::new(monitor, executor, config, cmd_rx);
        tokio::spawn(actor.run());

        Ok(Self { sender: cmd_tx })
    }

    /// Run a tick immediately and wait until all of its probes are applied
    pub async fn tick_now(&self) -> Result<TickReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::TickNow { respond_to: tx })
            .await
            .context("failed to send TickNow command")?;

        rx.await.context("failed to receive tick report")
    }

    pub async fn update_interval(&self, interval: Duration) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::UpdateInterval {
                interval,
                respond_to: tx,
            })
            .await
            .context("failed to send UpdateInterval command")?;

        rx.await.context("failed to receive response")??;
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SchedulerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
