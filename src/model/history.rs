/// Histories and datasets
///
/// A history is a named, ordered collection of datasets. Dataset metadata is
/// kept as a JSON object column; peek, info and blurb are the display fields
/// produced by the datatype plugins.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePool, Row};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub id: i64,
    pub name: String,
    pub create_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: i64,
    pub history_id: i64,
    pub name: String,
    pub extension: String,
    pub file_name: String,
    pub peek: Option<String>,
    pub info: Option<String>,
    pub blurb: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub create_time: String,
}

/// Fields supplied when a dataset is added to a history
#[derive(Debug, Clone, Default)]
pub struct NewDataset {
    pub history_id: i64,
    pub name: String,
    pub extension: String,
    pub file_name: String,
    pub peek: Option<String>,
    pub info: Option<String>,
    pub blurb: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

const DATASET_COLUMNS: &str =
    "id, history_id, name, extension, file_name, peek, info, blurb, metadata, create_time";

fn dataset_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Dataset> {
    let metadata_json: String = row.get("metadata");
    Ok(Dataset {
        id: row.get("id"),
        history_id: row.get("history_id"),
        name: row.get("name"),
        extension: row.get("extension"),
        file_name: row.get("file_name"),
        peek: row.get("peek"),
        info: row.get("info"),
        blurb: row.get("blurb"),
        metadata: serde_json::from_str(&metadata_json)?,
        create_time: row.get("create_time"),
    })
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_history(&self, name: &str) -> Result<History> {
        let result = sqlx::query("INSERT INTO history (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;

        let id = result.last_insert_rowid();
        tracing::debug!("📚 Created history {} ({})", id, name);

        self.get_history(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("History {} vanished after insert", id))
    }

    pub async fn get_history(&self, id: i64) -> Result<Option<History>> {
        let row = sqlx::query("SELECT id, name, create_time FROM history WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| History {
            id: row.get("id"),
            name: row.get("name"),
            create_time: row.get("create_time"),
        }))
    }

    /// Datasets of a history in creation order
    pub async fn list_datasets(&self, history_id: i64) -> Result<Vec<Dataset>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM dataset WHERE history_id = ? ORDER BY id",
            DATASET_COLUMNS
        ))
        .bind(history_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(dataset_from_row).collect()
    }

    pub async fn add_dataset(&self, dataset: NewDataset) -> Result<Dataset> {
        let metadata_json = serde_json::to_string(&dataset.metadata)?;

        let result = sqlx::query(
            r#"
            INSERT INTO dataset (history_id, name, extension, file_name, peek, info, blurb, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(dataset.history_id)
        .bind(&dataset.name)
        .bind(&dataset.extension)
        .bind(&dataset.file_name)
        .bind(&dataset.peek)
        .bind(&dataset.info)
        .bind(&dataset.blurb)
        .bind(&metadata_json)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        tracing::debug!(
            "📄 Added dataset {} '{}' ({}) to history {}",
            id,
            dataset.name,
            dataset.extension,
            dataset.history_id
        );

        self.get_dataset(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Dataset {} vanished after insert", id))
    }

    pub async fn get_dataset(&self, id: i64) -> Result<Option<Dataset>> {
        let row = sqlx::query(&format!("SELECT {} FROM dataset WHERE id = ?", DATASET_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(dataset_from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::connect;
    use tempfile::tempdir;

    #[tokio::test]
    async fn datasets_are_listed_in_creation_order() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(connect(&dir.path().join("db.sqlite")).await.unwrap());

        let history = store.create_history("EXAFS run").await.unwrap();
        assert_eq!(history.name, "EXAFS run");

        for name in ["b.prj", "a.inp"] {
            store
                .add_dataset(NewDataset {
                    history_id: history.id,
                    name: name.to_string(),
                    extension: "txt".to_string(),
                    file_name: format!("/data/{name}"),
                    ..NewDataset::default()
                })
                .await
                .unwrap();
        }

        let names: Vec<_> = store
            .list_datasets(history.id)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["b.prj", "a.inp"]);
    }

    #[tokio::test]
    async fn metadata_round_trips_through_json_column() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(connect(&dir.path().join("db.sqlite")).await.unwrap());
        let history = store.create_history("h").await.unwrap();

        let mut metadata = BTreeMap::new();
        metadata.insert("atsym".to_string(), "Fe".to_string());
        let dataset = store
            .add_dataset(NewDataset {
                history_id: history.id,
                name: "fe.prj".to_string(),
                extension: "prj".to_string(),
                file_name: "/data/fe.prj".to_string(),
                info: Some("Fe K".to_string()),
                metadata,
                ..NewDataset::default()
            })
            .await
            .unwrap();

        let loaded = store.get_dataset(dataset.id).await.unwrap().unwrap();
        assert_eq!(loaded.metadata.get("atsym").map(String::as_str), Some("Fe"));
        assert_eq!(loaded.info.as_deref(), Some("Fe K"));
        assert!(loaded.peek.is_none());
    }

    #[tokio::test]
    async fn unknown_ids_return_none() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(connect(&dir.path().join("db.sqlite")).await.unwrap());

        assert!(store.get_history(42).await.unwrap().is_none());
        assert!(store.get_dataset(42).await.unwrap().is_none());
        assert!(store.list_datasets(42).await.unwrap().is_empty());
    }
}
