/// SQLite persistence for installed tools
///
/// Tools are keyed by guid. The table is created by the schema migrations.

use crate::toolshed::types::InstalledTool;
use anyhow::Result;
use sqlx::{sqlite::SqlitePool, Row};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct InstalledToolStore {
    pool: SqlitePool,
}

fn tool_from_row(row: &sqlx::sqlite::SqliteRow) -> InstalledTool {
    InstalledTool {
        tool_shed: row.get("tool_shed"),
        owner: row.get("owner"),
        repository: row.get("repository"),
        tool_id: row.get("tool_id"),
        version: row.get("version"),
        repo_path: row.get("repo_path"),
    }
}

impl InstalledToolStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a tool or update the existing row with the same guid
    pub async fn save(&self, tool: &InstalledTool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO installed_tool (guid, tool_shed, owner, repository, tool_id, version, repo_path)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(guid) DO UPDATE SET
                repo_path = excluded.repo_path,
                installed_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(tool.guid())
        .bind(&tool.tool_shed)
        .bind(&tool.owner)
        .bind(&tool.repository)
        .bind(&tool.tool_id)
        .bind(&tool.version)
        .bind(&tool.repo_path)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, guid: &str) -> Result<Option<InstalledTool>> {
        let row = sqlx::query(
            "SELECT tool_shed, owner, repository, tool_id, version, repo_path
             FROM installed_tool WHERE guid = ?",
        )
        .bind(guid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(tool_from_row))
    }

    pub async fn list(&self) -> Result<Vec<InstalledTool>> {
        let rows = sqlx::query(
            "SELECT tool_shed, owner, repository, tool_id, version, repo_path
             FROM installed_tool ORDER BY guid",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(tool_from_row).collect())
    }

    /// Load every tool keyed by guid for registry initialization
    pub async fn load_all(&self) -> Result<HashMap<String, InstalledTool>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .map(|tool| (tool.guid(), tool))
            .collect())
    }

    pub async fn delete(&self, guid: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM installed_tool WHERE guid = ?")
            .bind(guid)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
