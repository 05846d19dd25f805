//! SQLite storage backend
//!
//! - **Embedded**: one database file, created on first start
//! - **WAL mode**: readers are not blocked by the flush transaction
//! - **Migrations**: schema versioned with `sqlx::migrate!`
//!
//! Timestamps are stored as Unix milliseconds.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, StorageBackend};
use super::error::{StorageError, StorageResult};
use crate::monitor::alerts::{Alert, AlertId, AlertStatus, FaultKind, FaultLogEntry, Resolution};
use crate::monitor::device::{Device, DeviceClass, Status};

pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

fn to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

fn from_millis(millis: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StorageError::CorruptRow(format!("timestamp {millis} out of range")))
}

fn parse_column<T>(row: &SqliteRow, column: &str) -> StorageResult<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e: String| StorageError::CorruptRow(format!("{column}: {e}")))
}

impl SqliteBackend {
    /// Open (or create) the database and run migrations
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path = db_path.as_ref().to_string_lossy().to_string();
        info!("initializing SQLite backend at: {db_path}");

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations complete");

        Ok(Self { pool, db_path })
    }

    fn device_from_row(row: &SqliteRow) -> StorageResult<Device> {
        let class: String = row.try_get("device_type")?;
        let latency: Option<i64> = row.try_get("latency_ms")?;
        let last_checked: Option<i64> = row.try_get("last_checked")?;

        Ok(Device {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            address: row.try_get("address")?,
            class: DeviceClass::from(class.as_str()),
            monitored: row.try_get("monitored")?,
            status: parse_column::<Status>(row, "status")?,
            latency_ms: latency.map(|ms| ms.max(0) as u64),
            last_checked: last_checked.map(from_millis).transpose()?,
            uptime: row.try_get("uptime")?,
        })
    }

    fn alert_from_row(row: &SqliteRow) -> StorageResult<Alert> {
        let id: i64 = row.try_get("id")?;
        let resolved_at: Option<i64> = row.try_get("resolved_at")?;
        let resolution: Option<String> = row.try_get("resolution")?;

        Ok(Alert {
            id: AlertId(id as u64),
            device_id: row.try_get("device_id")?,
            device_name: row.try_get("device_name")?,
            device_address: row.try_get("device_address")?,
            kind: parse_column::<FaultKind>(row, "kind")?,
            message: row.try_get("message")?,
            created_at: from_millis(row.try_get("created_at")?)?,
            status: parse_column::<AlertStatus>(row, "status")?,
            resolved_at: resolved_at.map(from_millis).transpose()?,
            resolution: resolution
                .map(|r| r.parse::<Resolution>())
                .transpose()
                .map_err(|e| StorageError::CorruptRow(format!("resolution: {e}")))?,
        })
    }

    fn fault_log_from_row(row: &SqliteRow) -> StorageResult<FaultLogEntry> {
        let id: i64 = row.try_get("id")?;

        Ok(FaultLogEntry {
            id: id as u64,
            device_id: row.try_get("device_id")?,
            device_name: row.try_get("device_name")?,
            device_address: row.try_get("device_address")?,
            kind: parse_column::<FaultKind>(row, "kind")?,
            description: row.try_get("description")?,
            timestamp: from_millis(row.try_get("timestamp")?)?,
        })
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self, devices), fields(count = devices.len()))]
    async fn upsert_devices(&self, devices: Vec<Device>) -> StorageResult<()> {
        if devices.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for device in devices {
            sqlx::query(
                r#"
                INSERT INTO devices (
                    id, name, address, device_type, monitored,
                    status, latency_ms, last_checked, uptime
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (id) DO UPDATE SET
                    name = excluded.name,
                    address = excluded.address,
                    device_type = excluded.device_type,
                    monitored = excluded.monitored,
                    status = excluded.status,
                    latency_ms = excluded.latency_ms,
                    last_checked = excluded.last_checked,
                    uptime = excluded.uptime
                "#,
            )
            .bind(&device.id)
            .bind(&device.name)
            .bind(&device.address)
            .bind(device.class.as_str())
            .bind(device.monitored)
            .bind(device.status.as_str())
            .bind(device.latency_ms.map(|ms| ms as i64))
            .bind(device.last_checked.as_ref().map(to_millis))
            .bind(device.uptime)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn delete_devices(&self, ids: Vec<String>) -> StorageResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM devices WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, alerts), fields(count = alerts.len()))]
    async fn upsert_alerts(&self, alerts: Vec<Alert>) -> StorageResult<()> {
        if alerts.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for alert in alerts {
            sqlx::query(
                r#"
                INSERT INTO alerts (
                    id, device_id, device_name, device_address, kind,
                    message, created_at, status, resolved_at, resolution
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (id) DO UPDATE SET
                    status = excluded.status,
                    resolved_at = excluded.resolved_at,
                    resolution = excluded.resolution
                "#,
            )
            .bind(alert.id.0 as i64)
            .bind(&alert.device_id)
            .bind(&alert.device_name)
            .bind(&alert.device_address)
            .bind(alert.kind.as_str())
            .bind(&alert.message)
            .bind(to_millis(&alert.created_at))
            .bind(alert.status.as_str())
            .bind(alert.resolved_at.as_ref().map(to_millis))
            .bind(alert.resolution.map(|r| r.as_str()))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn insert_fault_logs(&self, entries: Vec<FaultLogEntry>) -> StorageResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO fault_logs (
                    id, device_id, device_name, device_address, kind, description, timestamp
                )
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(entry.id as i64)
            .bind(&entry.device_id)
            .bind(&entry.device_name)
            .bind(&entry.device_address)
            .bind(entry.kind.as_str())
            .bind(&entry.description)
            .bind(to_millis(&entry.timestamp))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn load_devices(&self) -> StorageResult<Vec<Device>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, address, device_type, monitored,
                   status, latency_ms, last_checked, uptime
            FROM devices
            ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::device_from_row).collect()
    }

    async fn load_alerts(&self) -> StorageResult<Vec<Alert>> {
        let rows = sqlx::query(
            r#"
            SELECT id, device_id, device_name, device_address, kind,
                   message, created_at, status, resolved_at, resolution
            FROM alerts
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::alert_from_row).collect()
    }

    async fn load_fault_logs(&self, limit: usize) -> StorageResult<Vec<FaultLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, device_id, device_name, device_address, kind, description, timestamp
            FROM fault_logs
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::fault_log_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT COUNT(*) AS devices FROM devices")
            .fetch_one(&self.pool)
            .await
        {
            Ok(row) => {
                let devices: i64 = row.try_get("devices")?;
                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata: HashMap::from([
                        ("backend".to_string(), "sqlite".to_string()),
                        ("db_path".to_string(), self.db_path.clone()),
                        ("devices".to_string(), devices.to_string()),
                    ]),
                })
            }
            Err(e) => {
                warn!("health check failed: {e}");
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {e}"),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
