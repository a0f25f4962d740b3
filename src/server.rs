/// Server setup and initialization
///
/// Wires together all components: database, tool registry, cloud manager,
/// worker heartbeat and HTTP routes.

use crate::{
    api::{
        create_cloud_routes, create_history_routes, create_shed_static_routes, create_tool_routes,
        create_worker_routes, AppState,
    },
    cloud::{CloudManager, FetchUploadTool, FilesystemProviderFactory, ProviderFactory},
    config::Config,
    datatypes::DatatypesRegistry,
    model::{self, HistoryStore, WorkerProcessStore},
    runtime::HeartbeatService,
    toolshed::{InstalledToolStore, ToolRegistry},
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Build the shared application state from configuration
pub async fn create_state(config: &Config) -> Result<AppState> {
    let database_path = config.database.database_path();
    let pool = model::connect(&database_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open database {}: {}", database_path.display(), e))?;

    let histories = HistoryStore::new(pool.clone());
    let tool_storage = InstalledToolStore::new(pool.clone());

    tracing::info!("🧰 Initializing tool registry");
    let tools = Arc::new(ToolRegistry::new(tool_storage.clone()));
    tools
        .init_from_storage()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load installed tools: {}", e))?;

    let datatypes = Arc::new(DatatypesRegistry::default());
    tracing::debug!("🗂️ Registered datatypes: {:?}", datatypes.extensions());

    let factory: Option<Arc<dyn ProviderFactory>> = match &config.cloud.object_store_root {
        Some(root) => {
            tracing::info!("☁️ Cloud object store rooted at {}", root);
            Some(Arc::new(FilesystemProviderFactory::new(root)))
        }
        None => {
            tracing::warn!("⚠️ No cloud object store configured; cloud import/export is unavailable");
            None
        }
    };

    let upload_tool = FetchUploadTool::new(&config.datasets.dir, histories.clone(), Arc::clone(&datatypes));
    let cloud = CloudManager::new(
        factory,
        histories.clone(),
        Arc::new(upload_tool),
        Duration::from_secs(config.cloud.signed_url_ttl_secs),
    );

    Ok(AppState {
        histories,
        tool_storage,
        tools,
        workers: WorkerProcessStore::new(pool),
        cloud: Arc::new(cloud),
        datatypes,
    })
}

/// Merge every route group over one state
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .merge(create_history_routes())
        .merge(create_cloud_routes())
        .merge(create_tool_routes())
        .merge(create_worker_routes())
        .merge(create_shed_static_routes())
        .with_state(state)
}

/// Create the main Axum application and start the worker heartbeat
pub async fn create_app(config: Config) -> Result<Router> {
    let state = create_state(&config).await?;

    tracing::info!("💓 Initializing worker heartbeat");
    let heartbeat = Arc::new(
        HeartbeatService::new(state.workers.clone(), &config.worker)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize heartbeat: {}", e))?,
    );

    tokio::spawn(async move {
        if let Err(e) = heartbeat.start().await {
            tracing::error!("❌ Failed to start heartbeat: {}", e);
        }
    });

    let app = build_router(state);
    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting Benchway server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}
