//! StorageActor - persists monitor state to a StorageBackend
//!
//! ## Batching Strategy
//!
//! Events are coalesced per id (only the newest device or alert state is
//! written) and flushed:
//! - **Size trigger**: after 100 pending rows
//! - **Time trigger**: every `flush_interval` (default 5 seconds)
//!
//! Deletes are written before upserts. A failed flush keeps the pending
//! changes for the next attempt.
//!
//! If the event subscription lags, the actor drops its pending changes and
//! takes a full snapshot from the monitor instead.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time;
use tracing::{debug, error, instrument, trace, warn};

use super::messages::{MonitorEvent, StorageCommand, StorageStats};
use crate::monitor::NetworkMonitor;
use crate::monitor::alerts::{Alert, AlertFilter, AlertId, FAULT_LOG_CAPACITY, FaultLogEntry};
use crate::monitor::device::Device;
use crate::storage::StorageBackend;

/// Batch size trigger - flush after this many pending rows
const BATCH_SIZE_TRIGGER: usize = 100;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct PendingChanges {
    devices: HashMap<String, Device>,
    deleted: HashSet<String>,
    alerts: BTreeMap<AlertId, Alert>,
    fault_logs: Vec<FaultLogEntry>,
}

impl PendingChanges {
    fn len(&self) -> usize {
        self.devices.len() + self.deleted.len() + self.alerts.len() + self.fault_logs.len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::DeviceRegistered { device } | MonitorEvent::DeviceUpdated { device } => {
                self.deleted.remove(&device.id);
                self.devices.insert(device.id.clone(), device);
            }
            MonitorEvent::DeviceRemoved { device_id } => {
                self.devices.remove(&device_id);
                self.deleted.insert(device_id);
            }
            MonitorEvent::AlertOpened { alert } | MonitorEvent::AlertResolved { alert } => {
                self.alerts.insert(alert.id, alert);
            }
            MonitorEvent::FaultLogged { entry } => self.fault_logs.push(entry),
            MonitorEvent::Transition { .. } => {}
        }
    }
}

pub struct StorageActor {
    backend: Arc<dyn StorageBackend>,

    /// Source for full resynchronisation after a lag
    monitor: NetworkMonitor,

    event_rx: broadcast::Receiver<MonitorEvent>,
    command_rx: mpsc::Receiver<StorageCommand>,

    flush_interval: Duration,
    pending: PendingChanges,
    stats: StorageStats,
}

impl StorageActor {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        monitor: NetworkMonitor,
        event_rx: broadcast::Receiver<MonitorEvent>,
        command_rx: mpsc::Receiver<StorageCommand>,
        flush_interval: Duration,
    ) -> Self {
        Self {
            backend,
            monitor,
            event_rx,
            command_rx,
            flush_interval,
            pending: PendingChanges::default(),
            stats: StorageStats::default(),
        }
    }

    #[instrument(skip(self), fields(flush_interval = ?self.flush_interval))]
    pub async fn run(mut self) {
        debug!("starting storage actor");

        let mut flush_interval = time::interval(self.flush_interval);
        flush_interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                result = self.event_rx.recv() => {
                    match result {
                        Ok(event) => {
                            self.pending.record(event);
                            if self.pending.len() >= BATCH_SIZE_TRIGGER {
                                trace!("size-based flush triggered ({} rows)", self.pending.len());
                                let _ = self.flush().await;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("storage actor lagged, skipped {skipped} events; resynchronising");
                            self.resync().await;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!("event channel closed, shutting down");
                            break;
                        }
                    }
                }

                _ = flush_interval.tick() => {
                    if !self.pending.is_empty() {
                        trace!("time-based flush triggered ({} rows)", self.pending.len());
                        let _ = self.flush().await;
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(StorageCommand::Flush { respond_to }) => {
                            self.drain_events().await;
                            let _ = respond_to.send(self.flush().await);
                        }
                        Some(StorageCommand::GetStats { respond_to }) => {
                            let mut stats = self.stats.clone();
                            stats.pending = self.pending.len();
                            let _ = respond_to.send(stats);
                        }
                        Some(StorageCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }
                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        self.drain_events().await;
        if !self.pending.is_empty() {
            debug!("final flush before shutdown ({} rows)", self.pending.len());
            let _ = self.flush().await;
        }

        if let Err(e) = self.backend.close().await {
            error!("error closing backend: {e}");
        }
        debug!("storage actor stopped");
    }

    /// Record events already published, so a flush covers everything
    /// that happened before the command was sent
    async fn drain_events(&mut self) {
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => self.pending.record(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("storage actor lagged, skipped {skipped} events; resynchronising");
                    self.resync().await;
                }
                Err(_) => break,
            }
        }
    }

    /// Write pending changes; they are kept if the write fails
    async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        debug!("flushing {} rows to backend", self.pending.len());

        let deleted: Vec<String> = self.pending.deleted.iter().cloned().collect();
        let devices: Vec<Device> = self.pending.devices.values().cloned().collect();
        let alerts: Vec<Alert> = self.pending.alerts.values().cloned().collect();
        let fault_logs = self.pending.fault_logs.clone();
        let counts = (deleted.len(), devices.len(), alerts.len(), fault_logs.len());

        let result = async {
            self.backend
                .delete_devices(deleted)
                .await
                .context("failed to delete devices")?;
            self.backend
                .upsert_devices(devices)
                .await
                .context("failed to write devices")?;
            self.backend
                .upsert_alerts(alerts)
                .await
                .context("failed to write alerts")?;
            self.backend
                .insert_fault_logs(fault_logs)
                .await
                .context("failed to write fault logs")?;
            anyhow::Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                self.pending = PendingChanges::default();
                self.stats.flush_count += 1;
                self.stats.devices_deleted += counts.0 as u64;
                self.stats.devices_written += counts.1 as u64;
                self.stats.alerts_written += counts.2 as u64;
                self.stats.fault_logs_written += counts.3 as u64;
                trace!("flush #{} complete", self.stats.flush_count);
                Ok(())
            }
            Err(e) => {
                error!("failed to flush batch: {e:#}");
                self.stats.failed_flushes += 1;
                Err(e)
            }
        }
    }

    /// Replace pending changes with a full snapshot of the monitor
    async fn resync(&mut self) {
        let mut pending = PendingChanges::default();

        for device in self.monitor.list_devices().await {
            pending.devices.insert(device.id.clone(), device);
        }
        for alert in self.monitor.list_alerts(&AlertFilter::default()).await {
            pending.alerts.insert(alert.id, alert);
        }
        pending.fault_logs = self.monitor.list_fault_logs(FAULT_LOG_CAPACITY).await;

        match self.backend.load_devices().await {
            Ok(stored) => {
                pending.deleted = stored
                    .into_iter()
                    .map(|device| device.id)
                    .filter(|id| !pending.devices.contains_key(id))
                    .collect();
            }
            Err(e) => warn!("could not list stored devices during resync: {e}"),
        }

        self.pending = pending;
        self.stats.resyncs += 1;
        let _ = self.flush().await;
    }
}

/// Handle for controlling a StorageActor
#[derive(Clone)]
pub struct StorageHandle {
    sender: mpsc::Sender<StorageCommand>,
}

impl StorageHandle {
    /// Subscribe to the monitor and spawn the actor
    pub fn spawn(backend: Arc<dyn StorageBackend>, monitor: &NetworkMonitor, flush_interval: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = StorageActor::new(backend, monitor.clone(), monitor.subscribe(), cmd_rx, flush_interval);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Write pending changes now
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(StorageCommand::Flush { respond_to: tx })
            .await
            .context("failed to send Flush command")?;

        rx.await.context("failed to receive response")??;
        Ok(())
    }

    pub async fn get_stats(&self) -> Result<StorageStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(StorageCommand::GetStats { respond_to: tx })
            .await
            .context("failed to send GetStats command")?;

        rx.await.context("failed to receive stats")
    }

    /// Request a final flush and stop
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(StorageCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
