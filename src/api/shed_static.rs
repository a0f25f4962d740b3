/// Tool shed static assets
///
/// Serves images referenced by tool help pages straight from the installed
/// repository checkout. Requests must stay inside that checkout.

use crate::{
    api::AppState,
    error::{ApiError, ApiResult},
    toolshed::{resolve_contained, types::tool_guid, PathError},
};
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

pub fn create_shed_static_routes() -> Router<AppState> {
    Router::new().route(
        "/shed_tool_static/{shed}/{owner}/{repo}/{tool}/{version}/{*image_file}",
        get(serve_tool_image),
    )
}

/// GET /shed_tool_static/{shed}/{owner}/{repo}/{tool}/{version}/{*image_file}
async fn serve_tool_image(
    State(state): State<AppState>,
    Path((shed, owner, repo, tool, version, image_file)): Path<(
        String,
        String,
        String,
        String,
        String,
        String,
    )>,
) -> ApiResult<Response> {
    let guid = tool_guid(&shed, &owner, &repo, &tool, &version);
    let installed = state
        .tools
        .get_tool(&guid)
        .ok_or_else(|| ApiError::ObjectNotFound(format!("Tool '{}' is not installed.", guid)))?;

    let path = resolve_contained(std::path::Path::new(&installed.repo_path), &image_file)
        .map_err(|e| match e {
            PathError::Escapes(_) => {
                tracing::warn!("🚫 Rejected image path '{}' for tool {}", image_file, guid);
                ApiError::InvalidParameter(format!(
                    "The requested image '{}' is outside the repository directory.",
                    image_file
                ))
            }
            PathError::NotFound(_) => ApiError::ObjectNotFound(format!(
                "Image '{}' not found for tool '{}'.",
                image_file, guid
            )),
            PathError::Io(e) => ApiError::Internal(e.into()),
        })?;

    let not_found =
        || ApiError::ObjectNotFound(format!("Image '{}' not found for tool '{}'.", image_file, guid));
    if !path.is_file() {
        return Err(not_found());
    }
    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => not_found(),
        _ => ApiError::Internal(e.into()),
    })?;

    let mimetype = std::path::Path::new(&image_file)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| state.datatypes.get_mimetype_by_extension(ext));

    tracing::debug!("🖼️ Serving {} ({} bytes) for {}", path.display(), bytes.len(), guid);

    let mut response = bytes.into_response();
    if let Some(mimetype) = mimetype {
        let value = HeaderValue::from_str(mimetype).map_err(|e| ApiError::Internal(e.into()))?;
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }

    Ok(response)
}
