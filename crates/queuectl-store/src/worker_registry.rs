//! SQLite-backed Worker Registry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use queuectl_core::error::{QueueCtlError, Result};
use queuectl_core::store::WorkerRegistry;
use queuectl_core::worker::{WorkerRow, WorkerStatus};

pub struct SqliteWorkerRegistry {
    pool: SqlitePool,
}

impl SqliteWorkerRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_worker(row: &sqlx::sqlite::SqliteRow) -> Result<WorkerRow> {
        let status_str: String = row.try_get("status").map_err(anyhow::Error::from)?;
        let status = WorkerStatus::parse(&status_str)
            .ok_or_else(|| QueueCtlError::Store(anyhow::anyhow!("bad status: {status_str}")))?;

        Ok(WorkerRow {
            id: row.try_get("id").map_err(anyhow::Error::from)?,
            os_pid: row.try_get("os_pid").map_err(anyhow::Error::from)?,
            status,
            started_at: row.try_get("started_at").map_err(anyhow::Error::from)?,
            heartbeat_at: row.try_get("heartbeat_at").map_err(anyhow::Error::from)?,
            host: row.try_get("host").map_err(anyhow::Error::from)?,
        })
    }
}

#[async_trait]
impl WorkerRegistry for SqliteWorkerRegistry {
    async fn register(&self, worker_id: &str, os_pid: i64, host: &str) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO workers (id, os_pid, status, started_at, heartbeat_at, host)
            VALUES (?, ?, 'starting', ?, ?, ?)
            "#,
        )
        .bind(worker_id)
        .bind(os_pid)
        .bind(now)
        .bind(now)
        .bind(host)
        .execute(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        Ok(())
    }

    async fn mark_running(&self, worker_id: &str) -> Result<()> {
        sqlx::query("UPDATE workers SET status = 'running' WHERE id = ?")
            .bind(worker_id)
            .execute(&self.pool)
            .await
            .map_err(anyhow::Error::from)?;
        Ok(())
    }

    async fn heartbeat(&self, worker_id: &str, now: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE workers SET heartbeat_at = ? WHERE id = ?")
            .bind(now)
            .bind(worker_id)
            .execute(&self.pool)
            .await
            .map_err(anyhow::Error::from)?;
        Ok(())
    }

    async fn mark_stopping(&self, worker_id: &str) -> Result<()> {
        sqlx::query("UPDATE workers SET status = 'stopping' WHERE id = ?")
            .bind(worker_id)
            .execute(&self.pool)
            .await
            .map_err(anyhow::Error::from)?;
        Ok(())
    }

    async fn mark_stopped(&self, worker_id: &str) -> Result<()> {
        sqlx::query("UPDATE workers SET status = 'stopped' WHERE id = ?")
            .bind(worker_id)
            .execute(&self.pool)
            .await
            .map_err(anyhow::Error::from)?;
        Ok(())
    }

    async fn get(&self, worker_id: &str) -> Result<WorkerRow> {
        let row = sqlx::query("SELECT * FROM workers WHERE id = ?")
            .bind(worker_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(anyhow::Error::from)?
            .ok_or_else(|| QueueCtlError::NotFound(format!("worker {worker_id}")))?;

        Self::row_to_worker(&row)
    }

    async fn list(&self) -> Result<Vec<WorkerRow>> {
        let rows = sqlx::query("SELECT * FROM workers ORDER BY started_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(anyhow::Error::from)?;

        rows.iter().map(Self::row_to_worker).collect()
    }
}
