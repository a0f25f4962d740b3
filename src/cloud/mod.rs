/// Cloud storage import and export
///
/// Moves objects between cloud buckets and histories:
/// - Provider credential validation
/// - Backend traits plus a filesystem-backed implementation
/// - The upload tool that turns fetched objects into datasets
/// - `CloudManager`, the entry point used by the HTTP layer

pub mod credentials;
pub mod provider;
pub mod filesystem;
pub mod upload;
pub mod manager;

pub use credentials::ProviderConfig;
pub use filesystem::FilesystemProviderFactory;
pub use manager::CloudManager;
pub use provider::{Bucket, CloudProvider, ObjectInfo, ProviderFactory};
pub use upload::{FetchUploadTool, UploadOutput, UploadParams, UploadTool};
