/// Versioned schema migrations
///
/// Each migration carries the statements that apply it and the statements
/// that reverse it. Applied versions are recorded in `migrate_version`; every
/// step runs in its own transaction.

use anyhow::Result;
use sqlx::{sqlite::SqlitePool, Row};

#[derive(Debug)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub upgrade: &'static [&'static str],
    pub downgrade: &'static [&'static str],
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: histories, datasets and installed tools",
        upgrade: &[
            r#"
            CREATE TABLE history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                create_time TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            r#"
            CREATE TABLE dataset (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                history_id INTEGER NOT NULL REFERENCES history(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                extension TEXT NOT NULL,
                file_name TEXT NOT NULL,
                peek TEXT,
                info TEXT,
                blurb TEXT,
                metadata JSON NOT NULL DEFAULT '{}',
                create_time TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            "CREATE INDEX ix_dataset_history_id ON dataset(history_id)",
            r#"
            CREATE TABLE installed_tool (
                guid TEXT PRIMARY KEY,
                tool_shed TEXT NOT NULL,
                owner TEXT NOT NULL,
                repository TEXT NOT NULL,
                tool_id TEXT NOT NULL,
                version TEXT NOT NULL,
                repo_path TEXT NOT NULL,
                installed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        ],
        downgrade: &[
            "DROP TABLE installed_tool",
            "DROP INDEX ix_dataset_history_id",
            "DROP TABLE dataset",
            "DROP TABLE history",
        ],
    },
    Migration {
        version: 2,
        description: "Add table for worker processes",
        upgrade: &[
            r#"
            CREATE TABLE worker_process (
                id INTEGER PRIMARY KEY,
                server_name TEXT,
                hostname TEXT,
                update_time DATETIME
            )
            "#,
            "CREATE INDEX ix_worker_process_server_name ON worker_process(server_name)",
        ],
        downgrade: &[
            "DROP INDEX ix_worker_process_server_name",
            "DROP TABLE worker_process",
        ],
    },
];

pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

async fn ensure_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrate_version (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Highest applied migration version, 0 for an empty database
pub async fn current_version(pool: &SqlitePool) -> Result<i64> {
    ensure_version_table(pool).await?;
    let row = sqlx::query("SELECT COALESCE(MAX(version), 0) AS version FROM migrate_version")
        .fetch_one(pool)
        .await?;
    Ok(row.get("version"))
}

/// Apply every pending migration; returns the resulting version
pub async fn upgrade(pool: &SqlitePool) -> Result<i64> {
    let start = current_version(pool).await?;
    let mut version = start;

    for migration in MIGRATIONS.iter().filter(|m| m.version > start) {
        tracing::info!("⬆️ Applying migration {}: {}", migration.version, migration.description);

        let mut tx = pool.begin().await?;
        for statement in migration.upgrade {
            sqlx::query(*statement).execute(&mut *tx).await.map_err(|e| {
                anyhow::anyhow!("Migration {} failed: {}", migration.version, e)
            })?;
        }
        sqlx::query("INSERT INTO migrate_version (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        version = migration.version;
    }

    Ok(version)
}

/// Reverse applied migrations newer than `target`; returns the resulting version
pub async fn downgrade_to(pool: &SqlitePool, target: i64) -> Result<i64> {
    let current = current_version(pool).await?;

    for migration in MIGRATIONS
        .iter()
        .rev()
        .filter(|m| m.version > target && m.version <= current)
    {
        tracing::info!("⬇️ Reverting migration {}: {}", migration.version, migration.description);

        let mut tx = pool.begin().await?;
        for statement in migration.downgrade {
            sqlx::query(*statement).execute(&mut *tx).await.map_err(|e| {
                anyhow::anyhow!("Reverting migration {} failed: {}", migration.version, e)
            })?;
        }
        sqlx::query("DELETE FROM migrate_version WHERE version = ?")
            .bind(migration.version)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
    }

    current_version(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqliteConnectOptions;
    use tempfile::tempdir;

    async fn table_exists(pool: &SqlitePool, name: &str) -> bool {
        sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await
            .unwrap()
            .is_some()
    }

    async fn open(dir: &tempfile::TempDir) -> SqlitePool {
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("test.db"))
            .create_if_missing(true);
        SqlitePool::connect_with(options).await.unwrap()
    }

    #[tokio::test]
    async fn upgrade_creates_worker_process_table() {
        let dir = tempdir().unwrap();
        let pool = open(&dir).await;

        assert_eq!(current_version(&pool).await.unwrap(), 0);
        assert_eq!(upgrade(&pool).await.unwrap(), latest_version());
        assert!(table_exists(&pool, "worker_process").await);
        assert!(table_exists(&pool, "history").await);

        // re-running is a no-op
        assert_eq!(upgrade(&pool).await.unwrap(), latest_version());
    }

    #[tokio::test]
    async fn downgrade_drops_worker_process_table_only() {
        let dir = tempdir().unwrap();
        let pool = open(&dir).await;
        upgrade(&pool).await.unwrap();

        assert_eq!(downgrade_to(&pool, 1).await.unwrap(), 1);
        assert!(!table_exists(&pool, "worker_process").await);
        assert!(table_exists(&pool, "dataset").await);

        assert_eq!(upgrade(&pool).await.unwrap(), 2);
        assert!(table_exists(&pool, "worker_process").await);
    }

    #[tokio::test]
    async fn upgrade_from_partial_schema_applies_remaining_steps() {
        let dir = tempdir().unwrap();
        let pool = open(&dir).await;
        upgrade(&pool).await.unwrap();
        downgrade_to(&pool, 0).await.unwrap();

        // both steps run in one call and the reported version tracks the last one
        assert_eq!(upgrade(&pool).await.unwrap(), 2);
        assert_eq!(current_version(&pool).await.unwrap(), 2);
        assert!(table_exists(&pool, "installed_tool").await);
        assert!(table_exists(&pool, "worker_process").await);
    }

    #[tokio::test]
    async fn downgrade_to_zero_removes_everything() {
        let dir = tempdir().unwrap();
        let pool = open(&dir).await;
        upgrade(&pool).await.unwrap();

        assert_eq!(downgrade_to(&pool, 0).await.unwrap(), 0);
        for table in ["history", "dataset", "installed_tool", "worker_process"] {
            assert!(!table_exists(&pool, table).await, "{table} should be gone");
        }
    }
}
