/// Database connection setup
///
/// Opens (creating if needed) the SQLite database file and brings its schema
/// up to the latest migration before handing out the pool.

use crate::model::migrate;
use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::path::Path;

/// Connect to the database at `path` and apply pending migrations
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!("Failed to create database directory '{}': {}", parent.display(), e)
        })?;
    }

    tracing::info!("🗄️ Opening database: {}", path.display());

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(options).await?;

    let version = migrate::upgrade(&pool).await?;
    tracing::info!("✅ Database ready at schema version {}", version);

    Ok(pool)
}
