/// Upload tool
///
/// Turns a URL into a new history dataset: fetch the bytes, normalise text
/// line endings, store the file, sniff its format and let the datatype fill
/// in metadata and display fields.

use crate::{
    datatypes::{DatasetInstance, Datatype, DatatypesRegistry, FilePrefix},
    model::{Dataset, HistoryStore, NewDataset},
};
use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

/// Parameters of a single-file upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadParams {
    pub dbkey: String,
    /// Target extension, or "auto" to sniff
    pub file_type: String,
    pub upload_type: String,
    pub name: String,
    pub url_paste: String,
    pub space_to_tab: Option<String>,
    pub to_posix_lines: Option<String>,
}

impl UploadParams {
    /// Sniffed, POSIX-normalised upload of the object at `url`
    pub fn for_url(name: &str, url: &str) -> Self {
        Self {
            dbkey: "?".to_string(),
            file_type: "auto".to_string(),
            upload_type: "upload_dataset".to_string(),
            name: name.to_string(),
            url_paste: url.to_string(),
            space_to_tab: None,
            to_posix_lines: Some("Yes".to_string()),
        }
    }

    /// Flat form-field view, keyed the way the upload form names its inputs
    pub fn to_incoming(&self) -> BTreeMap<String, Option<String>> {
        BTreeMap::from([
            ("dbkey".to_string(), Some(self.dbkey.clone())),
            ("file_type".to_string(), Some(self.file_type.clone())),
            ("files_0|type".to_string(), Some(self.upload_type.clone())),
            ("files_0|space_to_tab".to_string(), self.space_to_tab.clone()),
            ("files_0|to_posix_lines".to_string(), self.to_posix_lines.clone()),
            ("files_0|NAME".to_string(), Some(self.name.clone())),
            ("files_0|url_paste".to_string(), Some(self.url_paste.clone())),
        ])
    }

    fn posix_lines(&self) -> bool {
        self.to_posix_lines.as_deref() == Some("Yes")
    }

    fn spaces_to_tabs(&self) -> bool {
        self.space_to_tab.as_deref().is_some_and(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadOutput {
    /// Output name and the dataset created for it
    pub out_data: Vec<(String, Dataset)>,
    pub job_errors: Vec<String>,
}

#[async_trait]
pub trait UploadTool: Send + Sync {
    async fn handle_input(&self, history_id: i64, params: &UploadParams) -> Result<UploadOutput>;
}

/// Upload tool that fetches `file://` and `http(s)://` URLs
pub struct FetchUploadTool {
    datasets_dir: PathBuf,
    histories: HistoryStore,
    datatypes: Arc<DatatypesRegistry>,
    http: reqwest::Client,
}

fn space_runs() -> &'static Regex {
    static SPACES: OnceLock<Regex> = OnceLock::new();
    SPACES.get_or_init(|| Regex::new(" +").expect("static regex"))
}

/// Apply the requested text conversions; binary and compressed content is untouched
fn convert_text(bytes: Vec<u8>, params: &UploadParams) -> Vec<u8> {
    let prefix = FilePrefix::from_bytes(&bytes);
    if prefix.is_compressed() || prefix.is_binary() {
        return bytes;
    }

    let mut text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => return e.into_bytes(),
    };

    if params.posix_lines() {
        text = text.replace("\r\n", "\n").replace('\r', "\n");
    }
    if params.spaces_to_tabs() {
        text = space_runs().replace_all(&text, "\t").into_owned();
    }

    text.into_bytes()
}

/// Sniff (when asked) and run the datatype's metadata and peek hooks
fn describe(
    datatypes: &DatatypesRegistry,
    path: &Path,
    file_type: &str,
) -> std::io::Result<(String, DatasetInstance)> {
    let extension = if file_type == "auto" {
        datatypes.sniff(path)?
    } else {
        file_type.to_lowercase()
    };

    let mut instance = DatasetInstance::new(path);
    match datatypes.get_datatype_by_extension(&extension) {
        Some(datatype) => {
            if let Err(e) = datatype.set_meta(&mut instance) {
                tracing::warn!("⚠️ Metadata for {} ({}) not set: {}", path.display(), extension, e);
            }
            datatype.set_peek(&mut instance);
        }
        None => crate::datatypes::Text.set_peek(&mut instance),
    }

    Ok((extension, instance))
}

impl FetchUploadTool {
    pub fn new(
        datasets_dir: impl Into<PathBuf>,
        histories: HistoryStore,
        datatypes: Arc<DatatypesRegistry>,
    ) -> Self {
        Self {
            datasets_dir: datasets_dir.into(),
            histories,
            datatypes,
            http: reqwest::Client::new(),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(path) = url.strip_prefix("file://") {
            return tokio::fs::read(path)
                .await
                .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path, e));
        }

        if url.starts_with("http://") || url.starts_with("https://") {
            let response = self.http.get(url).send().await?.error_for_status()?;
            return Ok(response.bytes().await?.to_vec());
        }

        Err(anyhow::anyhow!("unsupported URL scheme: {}", url))
    }
}

#[async_trait]
impl UploadTool for FetchUploadTool {
    async fn handle_input(&self, history_id: i64, params: &UploadParams) -> Result<UploadOutput> {
        tracing::debug!("📥 Upload into history {}: {:?}", history_id, params.to_incoming().keys());

        let bytes = match self.fetch(&params.url_paste).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("⚠️ Fetching '{}' failed: {}", params.name, e);
                return Ok(UploadOutput {
                    out_data: Vec::new(),
                    job_errors: vec![format!("Unable to fetch '{}': {}", params.name, e)],
                });
            }
        };

        let bytes = convert_text(bytes, params);

        tokio::fs::create_dir_all(&self.datasets_dir).await?;
        let path = self
            .datasets_dir
            .join(format!("dataset_{}.dat", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, &bytes).await?;

        let datatypes = Arc::clone(&self.datatypes);
        let file_type = params.file_type.clone();
        let sniff_path = path.clone();
        let (extension, instance) =
            tokio::task::spawn_blocking(move || describe(&datatypes, &sniff_path, &file_type))
                .await??;

        tracing::info!("📦 Stored '{}' as {} ({} bytes)", params.name, extension, bytes.len());

        let dataset = self
            .histories
            .add_dataset(NewDataset {
                history_id,
                name: params.name.clone(),
                extension,
                file_name: path.display().to_string(),
                peek: instance.peek,
                info: instance.info,
                blurb: instance.blurb,
                metadata: instance.metadata,
            })
            .await?;

        Ok(UploadOutput {
            out_data: vec![("output0".to_string(), dataset)],
            job_errors: Vec::new(),
        })
    }
}
