/// Benchway server entry point
///
/// Loads configuration from the environment and starts the HTTP server with
/// cloud import/export, history and tool registry APIs.

use benchway::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Cloud storage import/export at /api/cloud/storage/*
/// - Histories and datasets at /api/histories/*
/// - Installed tool registry at /api/tools/*
/// - Worker liveness at /api/workers
/// - Tool shed images at /shed_tool_static/*
/// - Health check at /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
