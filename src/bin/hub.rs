use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use netguard::{
    NetworkMonitor,
    actors::{notifier::NotifierHandle, scheduler::SchedulerHandle, storage::StorageHandle},
    config::{Config, StorageConfig, read_config_file},
    error::MonitorError,
    notify::Notifier,
    probe::{NetworkProber, ProbeExecutor},
    storage::{MemoryBackend, StorageBackend, restore_monitor},
    util::{get_api_addr, get_log_level},
};
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    let level = get_log_level();
    let filter = filter::Targets::new().with_targets(vec![("netguard", level), ("netguard_hub", level)]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let mut config = read_config_file(&args.file)?;
    if let Some(addr) = get_api_addr() {
        debug!("bind address overridden from environment: {addr}");
        config.api.bind_addr = addr;
    }

    let settings = config.monitor.resolve().context("invalid monitor settings")?;
    let monitor = NetworkMonitor::new(settings.tracker, settings.uptime_window);

    let (backend, flush_interval) = open_storage(&config).await?;
    restore_monitor(backend.as_ref(), &monitor)
        .await
        .context("failed to restore persisted state")?;

    // subscribe before configured devices are registered
    let notifier = match config.alert.clone() {
        Some(target) => Some(NotifierHandle::spawn(Notifier::new(target)?, monitor.subscribe())),
        None => {
            debug!("no alert target configured, notifications disabled");
            None
        }
    };
    let storage = StorageHandle::spawn(backend.clone(), &monitor, flush_interval);
    register_configured_devices(&config, &monitor).await?;

    let executor = ProbeExecutor::new(Arc::new(NetworkProber::new()?));
    let scheduler = SchedulerHandle::spawn(monitor.clone(), executor, settings.scheduler)?;

    #[cfg(feature = "api")]
    {
        let state = netguard::api::ApiState::new(monitor.clone())
            .with_scheduler(scheduler.clone())
            .with_storage(backend.clone());
        netguard::api::spawn_api_server(&config.api, state).await?;
    }

    info!(
        "monitoring {} devices every {:?}",
        monitor.get_stats().await.total_devices,
        settings.scheduler.tick_interval
    );

    // first scan right away instead of after one interval
    let initial = scheduler.clone();
    tokio::spawn(async move {
        match initial.tick_now().await {
            Ok(report) => debug!("initial scan: {report:?}"),
            Err(e) => error!("initial scan failed: {e:#}"),
        }
    });

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("shutting down");

    if let Err(e) = scheduler.shutdown().await {
        warn!("{e:#}");
    }
    if let Some(notifier) = notifier
        && let Err(e) = notifier.shutdown().await
    {
        warn!("{e:#}");
    }
    if let Err(e) = storage.flush().await {
        error!("final flush failed: {e:#}");
    }
    storage.shutdown().await?;

    Ok(())
}

async fn open_storage(config: &Config) -> anyhow::Result<(Arc<dyn StorageBackend>, Duration)> {
    match &config.storage {
        StorageConfig::None => {
            info!("persistence disabled, using in-memory storage");
            Ok((Arc::new(MemoryBackend::new()), Duration::from_secs(5)))
        }
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite {
            path,
            flush_interval_secs,
        } => {
            let backend = netguard::storage::sqlite::SqliteBackend::new(path)
                .await
                .with_context(|| format!("failed to open database {}", path.display()))?;
            Ok((Arc::new(backend), Duration::from_secs((*flush_interval_secs).max(1))))
        }
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("sqlite storage requested but the `storage-sqlite` feature is disabled")
        }
    }
}

/// Devices without an explicit id are matched against restored ones by address
async fn register_configured_devices(config: &Config, monitor: &NetworkMonitor) -> anyhow::Result<()> {
    let known: Vec<String> = monitor.list_devices().await.into_iter().map(|d| d.address).collect();

    for spec in &config.devices {
        if spec.id.is_none() && known.contains(&spec.address) {
            trace!("device at {} already restored from storage", spec.address);
            continue;
        }
        match monitor.register_device(spec.clone()).await {
            Ok(device) => debug!("registered {} ({})", device.id, device.address),
            Err(MonitorError::DuplicateDevice(id)) => {
                trace!("device {id} already restored from storage");
            }
            Err(e) => return Err(e).with_context(|| format!("invalid device '{}'", spec.address)),
        }
    }
    Ok(())
}
