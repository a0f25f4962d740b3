/// Benchway: utility services for a web-based scientific-workflow platform
///
/// This library bundles the datatype plugins, cloud import/export, tool shed
/// static asset serving and the tabular row filter behind one axum service.

// Core configuration and setup
pub mod config;

// API error type shared by every HTTP endpoint
pub mod error;

// Datatype plugins - format sniffing, metadata extraction, mimetype registry
pub mod datatypes;

// Tabular row filter - condition language and filter runner
pub mod filtering;

// Cloud storage import/export - provider credentials, backends, upload tool
pub mod cloud;

// Persistence layer - migrations, histories, installed tools, worker processes
pub mod model;

// Installed tool shed repositories - hot-reload registry
pub mod toolshed;

// Background services - worker liveness heartbeat
pub mod runtime;

// HTTP API layer - REST endpoints and static asset routes
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use cloud::CloudManager;
pub use datatypes::DatatypesRegistry;
pub use error::ApiError;
pub use filtering::{run_filter, FilterSummary};
pub use server::start_server;
