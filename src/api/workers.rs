/// Worker process listing

use crate::{api::AppState, error::ApiResult};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
pub struct WorkerQuery {
    /// Only workers that beat within this many seconds
    pub alive_within: Option<u64>,
}

pub fn create_worker_routes() -> Router<AppState> {
    Router::new().route("/api/workers", get(list_workers))
}

/// GET /api/workers?alive_within=SECS
async fn list_workers(
    State(state): State<AppState>,
    Query(query): Query<WorkerQuery>,
) -> ApiResult<Json<Value>> {
    let workers = match query.alive_within {
        Some(secs) => state.workers.list_alive(Duration::from_secs(secs)).await?,
        None => state.workers.list().await?,
    };

    Ok(Json(json!({ "workers": workers })))
}
