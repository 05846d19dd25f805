//! NotifierActor - forwards alert lifecycle events to Discord or a webhook
//!
//! One notification is sent per `AlertOpened` and `AlertResolved` event.
//! Failed deliveries are logged and dropped. While muted, alerts are
//! counted as suppressed; the mute lifts by itself once its duration has
//! passed.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::messages::{MonitorEvent, NotifierCommand, NotifierStats};
use crate::monitor::alerts::Alert;
use crate::notify::Notifier;

pub struct NotifierActor {
    notifier: Notifier,
    event_rx: broadcast::Receiver<MonitorEvent>,
    command_rx: mpsc::Receiver<NotifierCommand>,
    muted_until: Option<Instant>,
    stats: NotifierStats,
}

impl NotifierActor {
    pub fn new(
        notifier: Notifier,
        event_rx: broadcast::Receiver<MonitorEvent>,
        command_rx: mpsc::Receiver<NotifierCommand>,
    ) -> Self {
        Self {
            notifier,
            event_rx,
            command_rx,
            muted_until: None,
            stats: NotifierStats::default(),
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting notifier actor");

        loop {
            tokio::select! {
                result = self.event_rx.recv() => {
                    match result {
                        Ok(MonitorEvent::AlertOpened { alert } | MonitorEvent::AlertResolved { alert }) => {
                            self.deliver(&alert).await;
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("notifier lagged, {skipped} events were not delivered");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!("event channel closed, shutting down");
                            break;
                        }
                    }
                }

                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        warn!("command channel closed, shutting down");
                        break;
                    };
                    match cmd {
                        NotifierCommand::Mute { duration_secs } => {
                            info!("muting notifications for {duration_secs}s");
                            self.muted_until = Some(Instant::now() + Duration::from_secs(duration_secs));
                        }
                        NotifierCommand::Unmute => {
                            info!("notifications unmuted");
                            self.muted_until = None;
                        }
                        NotifierCommand::IsMuted { respond_to } => {
                            let _ = respond_to.send(self.is_muted());
                        }
                        NotifierCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.stats.clone());
                        }
                        NotifierCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }
            }
        }

        debug!("notifier actor stopped");
    }

    fn is_muted(&mut self) -> bool {
        match self.muted_until {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                info!("mute expired, notifications resumed");
                self.muted_until = None;
                false
            }
            None => false,
        }
    }

    async fn deliver(&mut self, alert: &Alert) {
        if self.is_muted() {
            debug!(alert_id = %alert.id, "notification suppressed while muted");
            self.stats.suppressed += 1;
            return;
        }

        match self.notifier.send(alert).await {
            Ok(()) => self.stats.sent += 1,
            Err(e) => {
                error!(alert_id = %alert.id, "failed to deliver notification: {e:#}");
                self.stats.failed += 1;
            }
        }
    }
}

/// Handle for controlling a NotifierActor
#[derive(Clone)]
pub struct NotifierHandle {
    sender: mpsc::Sender<NotifierCommand>,
}

impl NotifierHandle {
    pub fn spawn(notifier: Notifier, event_rx: broadcast::Receiver<MonitorEvent>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = NotifierActor::new(notifier, event_rx, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    pub async fn mute(&self, duration: Duration) -> Result<()> {
        self.sender
            .send(NotifierCommand::Mute {
                duration_secs: duration.as_secs(),
            })
            .await
            .context("failed to send Mute command")
    }

    pub async fn unmute(&self) -> Result<()> {
        self.sender
            .send(NotifierCommand::Unmute)
            .await
            .context("failed to send Unmute command")
    }

    pub async fn is_muted(&self) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(NotifierCommand::IsMuted { respond_to: tx })
            .await
            .context("failed to send IsMuted command")?;

        rx.await.context("failed to receive mute state")
    }

    pub async fn get_stats(&self) -> Result<NotifierStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(NotifierCommand::GetStats { respond_to: tx })
            .await
            .context("failed to send GetStats command")?;

        rx.await.context("failed to receive stats")
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(NotifierCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")
    }
}
