/// History REST API endpoints

use crate::{
    api::AppState,
    error::{ApiError, ApiResult},
    model::{Dataset, History},
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

const DEFAULT_HISTORY_NAME: &str = "Unnamed history";

#[derive(Debug, Default, Deserialize)]
pub struct CreateHistoryRequest {
    pub name: Option<String>,
}

pub fn create_history_routes() -> Router<AppState> {
    Router::new()
        .route("/api/histories", post(create_history))
        .route("/api/histories/{id}", get(get_history))
        .route("/api/histories/{id}/contents", get(history_contents))
}

/// POST /api/histories
/// Body: { "name": "..." }
async fn create_history(
    State(state): State<AppState>,
    Json(payload): Json<CreateHistoryRequest>,
) -> ApiResult<Json<History>> {
    let name = payload
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_HISTORY_NAME.to_string());

    let history = state.histories.create_history(&name).await?;
    tracing::info!("📚 Created history {} ({})", history.id, history.name);

    Ok(Json(history))
}

async fn load_history(state: &AppState, id: i64) -> ApiResult<History> {
    state
        .histories
        .get_history(id)
        .await?
        .ok_or_else(|| ApiError::ObjectNotFound(format!("History {} not found.", id)))
}

/// GET /api/histories/{id}
async fn get_history(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<History>> {
    Ok(Json(load_history(&state, id).await?))
}

/// GET /api/histories/{id}/contents
async fn history_contents(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Dataset>>> {
    let history = load_history(&state, id).await?;
    Ok(Json(state.histories.list_datasets(history.id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{self, get_json, send_json};
    use axum::http::StatusCode;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_then_read_history() {
        let dir = tempdir().unwrap();
        let app = create_history_routes().with_state(test_support::state(dir.path()).await);

        let (status, body) = send_json(&app, "POST", "/api/histories", json!({"name": "XAS"})).await;
        assert_eq!(status, StatusCode::OK);
        let id = body["id"].as_i64().unwrap();

        let (status, body) = get_json(&app, &format!("/api/histories/{id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "XAS");

        let (status, body) = get_json(&app, &format!("/api/histories/{id}/contents")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn unnamed_and_unknown_histories() {
        let dir = tempdir().unwrap();
        let app = create_history_routes().with_state(test_support::state(dir.path()).await);

        let (_, body) = send_json(&app, "POST", "/api/histories", json!({})).await;
        assert_eq!(body["name"], DEFAULT_HISTORY_NAME);

        let (status, body) = get_json(&app, "/api/histories/999/contents").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["err_code"], 404_001);
    }
}
