/// Cloud backend traits
///
/// A `ProviderFactory` turns validated credentials into a connected
/// `CloudProvider`, which hands out `Bucket` handles. Backends report
/// failures as `anyhow` errors; the manager maps them onto API errors.

use crate::cloud::credentials::ProviderConfig;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::{path::Path, sync::Arc, time::Duration};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    pub name: String,
    pub size: u64,
}

#[async_trait]
pub trait Bucket: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, object: &str) -> Result<Option<ObjectInfo>>;

    /// URL granting read access to `object` for `ttl`
    async fn generate_url(&self, object: &str, ttl: Duration) -> Result<String>;

    /// Create or replace `object` with the contents of `path`
    async fn upload_from_file(&self, object: &str, path: &Path) -> Result<()>;
}

#[async_trait]
pub trait CloudProvider: Send + Sync {
    async fn authenticate(&self) -> Result<()>;

    async fn get_bucket(&self, name: &str) -> Result<Option<Arc<dyn Bucket>>>;
}

pub trait ProviderFactory: Send + Sync {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn CloudProvider>>;
}
