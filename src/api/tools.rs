/// Installed tool REST API endpoints
///
/// Registers and removes tool shed tools. Every change is written to storage
/// first and then hot-reloaded into the registry used by the static routes.

use crate::{
    api::AppState,
    error::{ApiError, ApiResult},
    toolshed::InstalledTool,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub guid: String,
    #[serde(flatten)]
    pub tool: InstalledTool,
}

impl From<InstalledTool> for ToolResponse {
    fn from(tool: InstalledTool) -> Self {
        Self {
            guid: tool.guid(),
            tool,
        }
    }
}

/// The guid wildcard contains slashes, so it must be the last route segment
pub fn create_tool_routes() -> Router<AppState> {
    Router::new()
        .route("/api/tools", get(list_tools).post(register_tool))
        .route("/api/tools/{*guid}", get(get_tool).delete(delete_tool))
}

fn validate(tool: &InstalledTool) -> ApiResult<()> {
    let segments = [
        ("tool_shed", &tool.tool_shed),
        ("owner", &tool.owner),
        ("repository", &tool.repository),
        ("tool_id", &tool.tool_id),
        ("version", &tool.version),
    ];

    for (field, value) in segments {
        if value.is_empty() {
            return Err(ApiError::MissingParameter(format!(
                "The required parameter `{}` is missing.",
                field
            )));
        }
        if value.contains('/') {
            return Err(ApiError::InvalidParameter(format!(
                "The parameter `{}` must not contain '/'.",
                field
            )));
        }
    }

    if !std::path::Path::new(&tool.repo_path).is_dir() {
        return Err(ApiError::InvalidParameter(format!(
            "Repository path '{}' is not a directory.",
            tool.repo_path
        )));
    }

    Ok(())
}

/// POST /api/tools
/// Body: { "tool_shed": "...", "owner": "...", "repository": "...", "tool_id": "...", "version": "...", "repo_path": "..." }
async fn register_tool(
    State(state): State<AppState>,
    Json(tool): Json<InstalledTool>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    validate(&tool)?;

    let guid = tool.guid();
    if state.tool_storage.get(&guid).await?.is_some() {
        return Err(ApiError::Conflict(format!("Tool '{}' is already installed.", guid)));
    }

    state.tool_storage.save(&tool).await?;
    state.tools.reload_tool(&guid).await?;

    tracing::info!("🔧 Installed tool: {}", guid);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "guid": guid,
            "message": format!("Tool '{}' installed successfully", tool.tool_id),
        })),
    ))
}

/// GET /api/tools
async fn list_tools(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let tools: Vec<ToolResponse> = state
        .tool_storage
        .list()
        .await?
        .into_iter()
        .map(ToolResponse::from)
        .collect();

    Ok(Json(json!({ "tools": tools })))
}

/// GET /api/tools/{*guid}
async fn get_tool(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> ApiResult<Json<ToolResponse>> {
    state
        .tool_storage
        .get(&guid)
        .await?
        .map(|tool| Json(ToolResponse::from(tool)))
        .ok_or_else(|| ApiError::ObjectNotFound(format!("Tool '{}' is not installed.", guid)))
}

/// DELETE /api/tools/{*guid}
async fn delete_tool(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> ApiResult<Json<Value>> {
    state.tools.remove_tool(&guid);

    if !state.tool_storage.delete(&guid).await? {
        return Err(ApiError::ObjectNotFound(format!("Tool '{}' is not installed.", guid)));
    }

    tracing::info!("🗑️ Uninstalled tool: {}", guid);
    Ok(Json(json!({ "message": "Tool uninstalled successfully" })))
}
