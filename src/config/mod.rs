/// Configuration management for the Benchway service
///
/// Handles server binding, database location, dataset storage, cloud backend
/// and worker heartbeat parameters. Every field can be overridden through
/// environment variables for container deployment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Dataset file storage
    pub datasets: DatasetsConfig,
    /// Cloud object store backend
    pub cloud: CloudConfig,
    /// Worker process registration
    pub worker: WorkerConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// SQLite database location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Base directory for the database file (default: "data")
    pub data_dir: String,
    /// Database file name inside `data_dir`
    pub file_name: String,
}

impl DatabaseConfig {
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.file_name)
    }
}

/// Where uploaded dataset files are written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetsConfig {
    pub dir: String,
}

/// Cloud object store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Root directory of the filesystem-backed object store.
    /// When unset, cloud import/export reports that no backend is available.
    pub object_store_root: Option<String>,
    /// Lifetime of signed object URLs handed to the upload tool
    pub signed_url_ttl_secs: u64,
}

/// Identity and cadence of this worker's liveness heartbeat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub server_name: String,
    pub hostname: String,
    pub heartbeat_secs: u64,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        let data_dir = env_or("BENCHWAY_DATA_DIR", "data");
        let datasets_dir = std::env::var("BENCHWAY_DATASETS_DIR")
            .unwrap_or_else(|_| format!("{}/datasets", data_dir));
        let hostname = std::env::var("BENCHWAY_HOSTNAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_else(|_| "localhost".to_string());

        Self {
            server: ServerConfig {
                host: env_or("BENCHWAY_HOST", "0.0.0.0"),
                port: env_parse_or("BENCHWAY_PORT", 8080),
            },
            database: DatabaseConfig {
                data_dir,
                file_name: "benchway.db".to_string(),
            },
            datasets: DatasetsConfig { dir: datasets_dir },
            cloud: CloudConfig {
                object_store_root: std::env::var("BENCHWAY_OBJECT_STORE_ROOT").ok(),
                signed_url_ttl_secs: env_parse_or("BENCHWAY_SIGNED_URL_TTL", 3600),
            },
            worker: WorkerConfig {
                server_name: env_or("BENCHWAY_SERVER_NAME", "main"),
                hostname,
                heartbeat_secs: env_parse_or("BENCHWAY_HEARTBEAT_SECS", 60),
            },
        }
    }
}
