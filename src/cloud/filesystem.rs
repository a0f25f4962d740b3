/// Filesystem-backed cloud provider
///
/// Lays objects out as `{root}/{provider}/{bucket}/{object}`. Buckets are
/// directories that must already exist; signed URLs are `file://` URLs.

use crate::cloud::{
    credentials::ProviderConfig,
    provider::{Bucket, CloudProvider, ObjectInfo, ProviderFactory},
};
use anyhow::Result;
use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

#[derive(Debug, Clone)]
pub struct FilesystemProviderFactory {
    root: PathBuf,
}

impl FilesystemProviderFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ProviderFactory for FilesystemProviderFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn CloudProvider>> {
        Ok(Arc::new(FilesystemProvider {
            root: self.root.join(config.provider_name()),
        }))
    }
}

/// Single path segment; anything that could walk the tree is refused
fn check_name<'a>(kind: &str, name: &'a str) -> Result<&'a str> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(anyhow::anyhow!("invalid {} name '{}'", kind, name));
    }
    Ok(name)
}

#[derive(Debug)]
struct FilesystemProvider {
    root: PathBuf,
}

#[async_trait]
impl CloudProvider for FilesystemProvider {
    async fn authenticate(&self) -> Result<()> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(anyhow::anyhow!("{} is not a directory", self.root.display())),
            Err(e) => Err(anyhow::anyhow!("cannot access {}: {}", self.root.display(), e)),
        }
    }

    async fn get_bucket(&self, name: &str) -> Result<Option<Arc<dyn Bucket>>> {
        let path = self.root.join(check_name("bucket", name)?);

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(Some(Arc::new(FilesystemBucket {
                name: name.to_string(),
                path,
            }))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug)]
struct FilesystemBucket {
    name: String,
    path: PathBuf,
}

#[async_trait]
impl Bucket for FilesystemBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, object: &str) -> Result<Option<ObjectInfo>> {
        let path = self.path.join(check_name("object", object)?);

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(ObjectInfo {
                name: object.to_string(),
                size: meta.len(),
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn generate_url(&self, object: &str, ttl: Duration) -> Result<String> {
        let path = self.path.join(check_name("object", object)?);
        let absolute = tokio::fs::canonicalize(&path).await?;

        // local files never expire
        tracing::debug!("🔗 URL for {} requested with ttl {:?}", absolute.display(), ttl);

        Ok(format!("file://{}", absolute.display()))
    }

    async fn upload_from_file(&self, object: &str, path: &Path) -> Result<()> {
        let target = self.path.join(check_name("object", object)?);
        tokio::fs::copy(path, &target).await.map_err(|e| {
            anyhow::anyhow!("copying {} to {} failed: {}", path.display(), target.display(), e)
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn aws() -> ProviderConfig {
        ProviderConfig::Aws {
            access_key: "a".to_string(),
            secret_key: "s".to_string(),
        }
    }

    #[tokio::test]
    async fn buckets_and_objects_map_to_directories_and_files() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("aws/data")).unwrap();
        std::fs::write(dir.path().join("aws/data/fe.prj"), b"content").unwrap();

        let provider = FilesystemProviderFactory::new(dir.path()).create(&aws()).unwrap();
        provider.authenticate().await.unwrap();

        assert!(provider.get_bucket("missing").await.unwrap().is_none());
        let bucket = provider.get_bucket("data").await.unwrap().unwrap();
        assert_eq!(bucket.name(), "data");

        let info = bucket.get("fe.prj").await.unwrap().unwrap();
        assert_eq!(info.size, 7);
        assert!(bucket.get("other.prj").await.unwrap().is_none());

        let url = bucket.generate_url("fe.prj", Duration::from_secs(60)).await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("/aws/data/fe.prj"));
    }

    #[tokio::test]
    async fn upload_copies_file_into_bucket() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("aws/out")).unwrap();
        let source = dir.path().join("local.txt");
        std::fs::write(&source, b"hello").unwrap();

        let provider = FilesystemProviderFactory::new(dir.path()).create(&aws()).unwrap();
        let bucket = provider.get_bucket("out").await.unwrap().unwrap();
        bucket.upload_from_file("copy.txt", &source).await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("aws/out/copy.txt")).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn unreachable_root_fails_authentication() {
        let dir = tempdir().unwrap();
        let provider = FilesystemProviderFactory::new(dir.path().join("nowhere"))
            .create(&aws())
            .unwrap();

        assert!(provider.authenticate().await.is_err());
    }

    #[tokio::test]
    async fn traversal_names_are_refused() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("aws/data")).unwrap();
        let provider = FilesystemProviderFactory::new(dir.path()).create(&aws()).unwrap();

        assert!(provider.get_bucket("..").await.is_err());
        let bucket = provider.get_bucket("data").await.unwrap().unwrap();
        assert!(bucket.get("../secret").await.is_err());
    }
}
