/// Cloud storage REST API endpoints
///
/// Import objects from a bucket into a history, or export a history's
/// datasets to a bucket.

use crate::{
    api::AppState,
    error::{ApiError, ApiResult},
    model::Dataset,
};
use axum::{extract::State, response::Json, routing::post, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// POST /api/cloud/storage/get body
#[derive(Debug, Default, Deserialize)]
pub struct CloudGetRequest {
    pub history_id: Option<i64>,
    pub provider: Option<String>,
    pub bucket: Option<String>,
    pub objects: Option<Vec<String>>,
    pub credentials: Option<Map<String, Value>>,
}

/// POST /api/cloud/storage/send body
#[derive(Debug, Default, Deserialize)]
pub struct CloudSendRequest {
    pub history_id: Option<i64>,
    pub provider: Option<String>,
    pub bucket: Option<String>,
    pub credentials: Option<Map<String, Value>>,
    pub dataset_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub overwrite_existing: bool,
}

pub fn create_cloud_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cloud/storage/get", post(get_objects))
        .route("/api/cloud/storage/send", post(send_datasets))
}

fn required<T>(value: Option<T>, key: &str) -> ApiResult<T> {
    value.ok_or_else(|| {
        ApiError::MissingParameter(format!("The required parameter `{}` is missing.", key))
    })
}

/// Copy objects from a bucket into a history
async fn get_objects(
    State(state): State<AppState>,
    Json(payload): Json<CloudGetRequest>,
) -> ApiResult<Json<Vec<Dataset>>> {
    let history_id = required(payload.history_id, "history_id")?;
    let provider = required(payload.provider, "provider")?;
    let bucket = required(payload.bucket, "bucket")?;
    let objects = required(payload.objects, "objects")?;
    let credentials = required(payload.credentials, "credentials")?;

    let datasets = state
        .cloud
        .upload(history_id, &provider, &bucket, &objects, &credentials)
        .await?;

    tracing::info!("☁️ Imported {} dataset(s) into history {}", datasets.len(), history_id);
    Ok(Json(datasets))
}

/// Copy a history's datasets into a bucket
async fn send_datasets(
    State(state): State<AppState>,
    Json(payload): Json<CloudSendRequest>,
) -> ApiResult<Json<Value>> {
    let history_id = required(payload.history_id, "history_id")?;
    let provider = required(payload.provider, "provider")?;
    let bucket = required(payload.bucket, "bucket")?;
    let credentials = required(payload.credentials, "credentials")?;
    let dataset_ids: Option<HashSet<i64>> = payload.dataset_ids.map(|ids| ids.into_iter().collect());

    let labels = state
        .cloud
        .download(
            history_id,
            &provider,
            &bucket,
            &credentials,
            dataset_ids.as_ref(),
            payload.overwrite_existing,
        )
        .await?;

    Ok(Json(json!({
        "bucket_name": bucket,
        "sent_dataset_labels": labels,
    })))
}
