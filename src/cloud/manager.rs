/// Cloud import/export manager
///
/// Validates credentials, connects to the configured backend and moves
/// objects between a bucket and a history in either direction.

use crate::{
    cloud::{
        credentials::ProviderConfig,
        provider::{Bucket, CloudProvider, ProviderFactory},
        upload::{UploadParams, UploadTool},
    },
    error::{ApiError, ApiResult},
    model::{Dataset, History, HistoryStore},
};
use serde_json::{Map, Value};
use std::{collections::HashSet, path::Path, sync::Arc, time::Duration};

pub const NO_BACKEND_MESSAGE: &str = "Cloud ObjectStore is configured, but no cloud provider \
backend is available. Please configure a provider backend or modify ObjectStore configuration.";

pub struct CloudManager {
    /// None when no object store backend is configured
    factory: Option<Arc<dyn ProviderFactory>>,
    histories: HistoryStore,
    upload_tool: Arc<dyn UploadTool>,
    signed_url_ttl: Duration,
}

impl CloudManager {
    pub fn new(
        factory: Option<Arc<dyn ProviderFactory>>,
        histories: HistoryStore,
        upload_tool: Arc<dyn UploadTool>,
        signed_url_ttl: Duration,
    ) -> Self {
        Self {
            factory,
            histories,
            upload_tool,
            signed_url_ttl,
        }
    }

    pub fn has_backend(&self) -> bool {
        self.factory.is_some()
    }

    async fn configure_provider(
        &self,
        provider: &str,
        credentials: &Map<String, Value>,
    ) -> ApiResult<Arc<dyn CloudProvider>> {
        let factory = self
            .factory
            .as_ref()
            .ok_or_else(|| ApiError::BackendUnavailable(NO_BACKEND_MESSAGE.to_string()))?;

        let config = ProviderConfig::from_credentials(provider, credentials)?;
        let connection = factory.create(&config)?;

        connection.authenticate().await.map_err(|e| {
            ApiError::AuthenticationFailed(format!(
                "Could not authenticate to the '{}' provider. {}",
                provider, e
            ))
        })?;

        tracing::debug!("☁️ Connected to {} provider", config.provider_name());
        Ok(connection)
    }

    async fn require_history(&self, history_id: i64) -> ApiResult<History> {
        self.histories
            .get_history(history_id)
            .await?
            .ok_or_else(|| ApiError::ObjectNotFound(format!("History {} not found.", history_id)))
    }

    /// Import `objects` from `bucket_name` into the history as new datasets
    pub async fn upload(
        &self,
        history_id: i64,
        provider: &str,
        bucket_name: &str,
        objects: &[String],
        credentials: &Map<String, Value>,
    ) -> ApiResult<Vec<Dataset>> {
        let connection = self.configure_provider(provider, credentials).await?;

        let bucket = connection
            .get_bucket(bucket_name)
            .await
            .map_err(|e| {
                ApiError::ItemAccessibility(format!(
                    "Could not get the bucket `{}`: {}",
                    bucket_name, e
                ))
            })?
            .ok_or_else(|| {
                ApiError::InvalidParameter(format!("The bucket `{}` not found.", bucket_name))
            })?;

        let history = self.require_history(history_id).await?;

        tracing::info!(
            "☁️ Importing {} object(s) from {}:{} into history {}",
            objects.len(),
            provider,
            bucket_name,
            history.id
        );

        let mut datasets = Vec::new();
        for object in objects {
            let found = bucket.get(object).await.map_err(|e| {
                ApiError::ItemAccessibility(format!("Could not get the object `{}`: {}", object, e))
            })?;
            if found.is_none() {
                return Err(ApiError::ObjectNotFound(format!(
                    "Could not get the object `{}`.",
                    object
                )));
            }

            let url = bucket.generate_url(object, self.signed_url_ttl).await?;
            let params = UploadParams::for_url(object, &url);
            let output = self.upload_tool.handle_input(history.id, &params).await?;

            if !output.job_errors.is_empty() {
                return Err(ApiError::InvalidParameter(format!(
                    "Following error occurred while uploading the given object(s) from {}: {}",
                    provider,
                    output.job_errors.join("; ")
                )));
            }

            datasets.extend(output.out_data.into_iter().map(|(_, dataset)| dataset));
        }

        Ok(datasets)
    }

    /// Export the history's datasets to `bucket_name`; returns the object labels used
    pub async fn download(
        &self,
        history_id: i64,
        provider: &str,
        bucket_name: &str,
        credentials: &Map<String, Value>,
        dataset_ids: Option<&HashSet<i64>>,
        overwrite_existing: bool,
    ) -> ApiResult<Vec<String>> {
        let connection = self.configure_provider(provider, credentials).await?;

        let bucket = connection
            .get_bucket(bucket_name)
            .await
            .map_err(|e| {
                ApiError::ItemAccessibility(format!(
                    "Could not get the bucket `{}`: {}",
                    bucket_name, e
                ))
            })?
            .ok_or_else(|| {
                ApiError::ObjectNotFound(format!(
                    "Could not find the specified bucket `{}`.",
                    bucket_name
                ))
            })?;

        let history = self.require_history(history_id).await?;
        let datasets = self.histories.list_datasets(history.id).await?;

        let mut labels = Vec::new();
        for dataset in datasets
            .iter()
            .filter(|d| dataset_ids.map_or(true, |ids| ids.contains(&d.id)))
        {
            let label = self.object_label(bucket.as_ref(), dataset, overwrite_existing).await?;

            bucket
                .upload_from_file(&label, Path::new(&dataset.file_name))
                .await
                .map_err(|e| {
                    ApiError::ItemAccessibility(format!(
                        "Could not send dataset `{}` to the bucket `{}`: {}",
                        dataset.name, bucket_name, e
                    ))
                })?;

            tracing::info!("📤 Sent dataset {} to {}:{} as {}", dataset.id, provider, bucket_name, label);
            labels.push(label);
        }

        Ok(labels)
    }

    /// Dataset name, timestamped when it would clobber an existing object
    async fn object_label(
        &self,
        bucket: &dyn Bucket,
        dataset: &Dataset,
        overwrite_existing: bool,
    ) -> ApiResult<String> {
        if overwrite_existing {
            return Ok(dataset.name.clone());
        }

        match bucket.get(&dataset.name).await? {
            Some(_) => Ok(format!(
                "{}-{}",
                dataset.name,
                chrono::Local::now().format("%y-%m-%d-%H-%M-%S")
            )),
            None => Ok(dataset.name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cloud::{filesystem::FilesystemProviderFactory, upload::{FetchUploadTool, UploadOutput}},
        datatypes::DatatypesRegistry,
        model::{connect, NewDataset},
    };
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    fn aws_credentials() -> Map<String, Value> {
        json!({"access_key": "AK", "secret_key": "SK"})
            .as_object()
            .cloned()
            .unwrap()
    }

    async fn manager(dir: &TempDir) -> (CloudManager, HistoryStore) {
        std::fs::create_dir_all(dir.path().join("store/aws/bucket1")).unwrap();
        let histories = HistoryStore::new(connect(&dir.path().join("db.sqlite")).await.unwrap());
        let tool = FetchUploadTool::new(
            dir.path().join("datasets"),
            histories.clone(),
            Arc::new(DatatypesRegistry::default()),
        );
        let manager = CloudManager::new(
            Some(Arc::new(FilesystemProviderFactory::new(dir.path().join("store")))),
            histories.clone(),
            Arc::new(tool),
            Duration::from_secs(3600),
        );
        (manager, histories)
    }

    #[tokio::test]
    async fn upload_imports_objects_into_history() {
        let dir = tempdir().unwrap();
        let (manager, histories) = manager(&dir).await;
        std::fs::write(dir.path().join("store/aws/bucket1/notes.txt"), "hello\r\nworld\r\n").unwrap();
        let history = histories.create_history("imports").await.unwrap();

        let datasets = manager
            .upload(history.id, "aws", "bucket1", &["notes.txt".to_string()], &aws_credentials())
            .await
            .unwrap();

        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0].name, "notes.txt");
        assert_eq!(datasets[0].extension, "txt");
        assert_eq!(std::fs::read_to_string(&datasets[0].file_name).unwrap(), "hello\nworld\n");
    }

    #[tokio::test]
    async fn upload_reports_missing_bucket_and_object() {
        let dir = tempdir().unwrap();
        let (manager, histories) = manager(&dir).await;
        let history = histories.create_history("imports").await.unwrap();

        let err = manager
            .upload(history.id, "aws", "nope", &["x".to_string()], &aws_credentials())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidParameter(_)));
        assert_eq!(err.to_string(), "The bucket `nope` not found.");

        let err = manager
            .upload(history.id, "aws", "bucket1", &["x".to_string()], &aws_credentials())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ObjectNotFound(_)));
        assert_eq!(err.to_string(), "Could not get the object `x`.");
    }

    #[tokio::test]
    async fn credentials_are_checked_before_the_backend() {
        let dir = tempdir().unwrap();
        let (manager, _) = manager(&dir).await;

        let err = manager
            .upload(1, "aws", "bucket1", &[], &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingParameter(_)));
    }

    #[tokio::test]
    async fn missing_backend_is_reported() {
        let dir = tempdir().unwrap();
        let histories = HistoryStore::new(connect(&dir.path().join("db.sqlite")).await.unwrap());
        let tool = FetchUploadTool::new(
            dir.path().join("datasets"),
            histories.clone(),
            Arc::new(DatatypesRegistry::default()),
        );
        let manager = CloudManager::new(None, histories, Arc::new(tool), Duration::from_secs(60));

        let err = manager
            .download(1, "aws", "bucket1", &aws_credentials(), None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BackendUnavailable(_)));
        assert_eq!(err.to_string(), NO_BACKEND_MESSAGE);
    }

    #[tokio::test]
    async fn authentication_failure_names_provider() {
        let dir = tempdir().unwrap();
        let (manager, _) = manager(&dir).await;

        let err = manager
            .upload(
                1,
                "azure",
                "bucket1",
                &[],
                &json!({"subscription_id": "s", "client_id": "c", "secret": "x", "tenant": "t"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AuthenticationFailed(_)));
        assert!(err
            .to_string()
            .starts_with("Could not authenticate to the 'azure' provider."));
    }

    struct FailingTool;

    #[async_trait]
    impl UploadTool for FailingTool {
        async fn handle_input(&self, _: i64, _: &UploadParams) -> anyhow::Result<UploadOutput> {
            Ok(UploadOutput {
                out_data: Vec::new(),
                job_errors: vec!["disk full".to_string()],
            })
        }
    }

    #[tokio::test]
    async fn job_errors_are_surfaced() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("store/aws/bucket1")).unwrap();
        std::fs::write(dir.path().join("store/aws/bucket1/a.txt"), "a").unwrap();
        let histories = HistoryStore::new(connect(&dir.path().join("db.sqlite")).await.unwrap());
        let history = histories.create_history("h").await.unwrap();
        let manager = CloudManager::new(
            Some(Arc::new(FilesystemProviderFactory::new(dir.path().join("store")))),
            histories,
            Arc::new(FailingTool),
            Duration::from_secs(60),
        );

        let err = manager
            .upload(history.id, "aws", "bucket1", &["a.txt".to_string()], &aws_credentials())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Following error occurred while uploading the given object(s) from aws: disk full"
        );
    }

    #[tokio::test]
    async fn download_sends_selected_datasets_without_clobbering() {
        let dir = tempdir().unwrap();
        let (manager, histories) = manager(&dir).await;
        let history = histories.create_history("exports").await.unwrap();

        let mut ids = HashSet::new();
        for name in ["a.txt", "b.txt"] {
            let file = dir.path().join(name);
            std::fs::write(&file, name).unwrap();
            let dataset = histories
                .add_dataset(NewDataset {
                    history_id: history.id,
                    name: name.to_string(),
                    extension: "txt".to_string(),
                    file_name: file.display().to_string(),
                    ..NewDataset::default()
                })
                .await
                .unwrap();
            if name == "a.txt" {
                ids.insert(dataset.id);
            }
        }

        let labels = manager
            .download(history.id, "aws", "bucket1", &aws_credentials(), Some(&ids), false)
            .await
            .unwrap();
        assert_eq!(labels, vec!["a.txt"]);

        // second export finds a.txt already present
        let labels = manager
            .download(history.id, "aws", "bucket1", &aws_credentials(), None, false)
            .await
            .unwrap();
        assert_eq!(labels.len(), 2);
        assert!(labels[0].starts_with("a.txt-"));
        assert_eq!(labels[1], "b.txt");

        let labels = manager
            .download(history.id, "aws", "bucket1", &aws_credentials(), None, true)
            .await
            .unwrap();
        assert_eq!(labels, vec!["a.txt", "b.txt"]);

        let err = manager
            .download(history.id, "aws", "missing", &aws_credentials(), None, true)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Could not find the specified bucket `missing`.");
    }
}
