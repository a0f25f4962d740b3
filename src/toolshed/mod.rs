/// Tool shed repositories
///
/// Installed tool shed tools, their persistence and the in-memory registry
/// used to resolve static assets shipped inside each repository:
/// - Type definitions (InstalledTool)
/// - SQLite persistence with sqlx
/// - Lock-free hot-reload registry using ArcSwap
/// - Repository-contained path resolution

pub mod types;

pub mod storage;

pub mod registry;

pub mod paths;

pub use paths::{resolve_contained, PathError};
pub use registry::ToolRegistry;
pub use storage::InstalledToolStore;
pub use types::InstalledTool;
