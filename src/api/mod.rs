/// HTTP API Layer
///
/// REST endpoints and static asset routes. It handles:
/// - Cloud import/export requests
/// - Histories and their datasets
/// - Installed tool registration with hot-reload
/// - Tool shed static images served from repository checkouts
/// - Worker liveness listing

use crate::{
    cloud::CloudManager,
    datatypes::DatatypesRegistry,
    model::{HistoryStore, WorkerProcessStore},
    toolshed::{InstalledToolStore, ToolRegistry},
};
use std::sync::Arc;

// Cloud storage import/export endpoints
pub mod cloud;

// History creation and content listing
pub mod histories;

// Installed tool management endpoints (POST/GET/DELETE)
pub mod tools;

// Static images shipped in tool shed repositories
pub mod shed_static;

// Worker process listing
pub mod workers;

pub use cloud::create_cloud_routes;
pub use histories::create_history_routes;
pub use shed_static::create_shed_static_routes;
pub use tools::create_tool_routes;
pub use workers::create_worker_routes;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub histories: HistoryStore,
    pub tool_storage: InstalledToolStore,
    /// Hot-reload registry for installed tools
    pub tools: Arc<ToolRegistry>,
    pub workers: WorkerProcessStore,
    pub cloud: Arc<CloudManager>,
    /// Extension to mimetype lookups
    pub datatypes: Arc<DatatypesRegistry>,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::AppState;
    use crate::{
        cloud::{CloudManager, FetchUploadTool, FilesystemProviderFactory},
        datatypes::DatatypesRegistry,
        model::{connect, HistoryStore, WorkerProcessStore},
        toolshed::{InstalledToolStore, ToolRegistry},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use std::{path::Path, sync::Arc, time::Duration};
    use tower::ServiceExt;

    /// State backed by a fresh database and an object store under `dir/store`
    pub async fn state(dir: &Path) -> AppState {
        let pool = connect(&dir.join("db.sqlite")).await.expect("database");
        let histories = HistoryStore::new(pool.clone());
        let tool_storage = InstalledToolStore::new(pool.clone());
        let tools = Arc::new(ToolRegistry::new(tool_storage.clone()));
        tools.init_from_storage().await.expect("registry");
        let datatypes = Arc::new(DatatypesRegistry::default());

        let upload_tool = FetchUploadTool::new(dir.join("datasets"), histories.clone(), Arc::clone(&datatypes));
        let cloud = CloudManager::new(
            Some(Arc::new(FilesystemProviderFactory::new(dir.join("store")))),
            histories.clone(),
            Arc::new(upload_tool),
            Duration::from_secs(3600),
        );

        AppState {
            histories,
            tool_storage,
            tools,
            workers: WorkerProcessStore::new(pool),
            cloud: Arc::new(cloud),
            datatypes,
        }
    }

    pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), 1024 * 1024).await.expect("body");
        (status, body.to_vec())
    }

    pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).expect("request");
        let (status, body) = send(app, request).await;
        (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
    }

    pub async fn send_json(
        app: &Router,
        method: &str,
        uri: &str,
        payload: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request");
        let (status, body) = send(app, request).await;
        (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
    }
}
