/// Worker process registry
///
/// Each server process records its name, host and the time of its latest
/// heartbeat in `worker_process`. Rows updated recently identify live workers.

use anyhow::Result;
use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqlitePool, Row};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerProcess {
    pub id: i64,
    pub server_name: Option<String>,
    pub hostname: Option<String>,
    pub update_time: Option<NaiveDateTime>,
}

fn worker_from_row(row: &sqlx::sqlite::SqliteRow) -> WorkerProcess {
    WorkerProcess {
        id: row.get("id"),
        server_name: row.get("server_name"),
        hostname: row.get("hostname"),
        update_time: row.get("update_time"),
    }
}

#[derive(Debug, Clone)]
pub struct WorkerProcessStore {
    pool: SqlitePool,
}

impl WorkerProcessStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Refresh the update time of (server_name, hostname), registering it first if needed
    pub async fn heartbeat(&self, server_name: &str, hostname: &str) -> Result<WorkerProcess> {
        let now = Utc::now().naive_utc();

        let updated = sqlx::query(
            "UPDATE worker_process SET update_time = ? WHERE server_name = ? AND hostname = ?",
        )
        .bind(now)
        .bind(server_name)
        .bind(hostname)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            sqlx::query(
                "INSERT INTO worker_process (server_name, hostname, update_time) VALUES (?, ?, ?)",
            )
            .bind(server_name)
            .bind(hostname)
            .bind(now)
            .execute(&self.pool)
            .await?;
            tracing::info!("📝 Registered worker process {}@{}", server_name, hostname);
        }

        let row = sqlx::query(
            "SELECT id, server_name, hostname, update_time FROM worker_process
             WHERE server_name = ? AND hostname = ? ORDER BY id LIMIT 1",
        )
        .bind(server_name)
        .bind(hostname)
        .fetch_one(&self.pool)
        .await?;

        Ok(worker_from_row(&row))
    }

    pub async fn get(&self, id: i64) -> Result<Option<WorkerProcess>> {
        let row = sqlx::query(
            "SELECT id, server_name, hostname, update_time FROM worker_process WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(worker_from_row))
    }

    pub async fn list(&self) -> Result<Vec<WorkerProcess>> {
        let rows = sqlx::query(
            "SELECT id, server_name, hostname, update_time FROM worker_process ORDER BY server_name, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(worker_from_row).collect())
    }

    /// Workers whose last heartbeat is at most `max_age` old
    ///
    /// A window reaching past the earliest representable time selects every
    /// worker that has sent a heartbeat.
    pub async fn list_alive(&self, max_age: Duration) -> Result<Vec<WorkerProcess>> {
        let cutoff = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|max_age| Utc::now().naive_utc().checked_sub_signed(max_age))
            .unwrap_or(NaiveDateTime::MIN);

        let rows = sqlx::query(
            "SELECT id, server_name, hostname, update_time FROM worker_process
             WHERE update_time >= ? ORDER BY server_name, id",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(worker_from_row).collect())
    }

    pub async fn remove(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM worker_process WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
