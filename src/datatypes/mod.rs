/// Datatype plugins
///
/// Format detection and metadata extraction for dataset files:
/// - Prefix sniffing helpers (gzip aware)
/// - X-ray absorption spectroscopy formats (Athena projects, FEFF inputs)
/// - Extension registry mapping datatypes to mimetypes

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

// Prefix reading, header splitting and peeks
pub mod sniff;

// Athena project and FEFF input datatypes
pub mod larch;

// Extension -> mimetype/datatype lookup and auto-detection
pub mod registry;

pub use larch::{AthenaProject, FeffInput};
pub use registry::DatatypesRegistry;
pub use sniff::FilePrefix;

/// Descriptor of a metadata field a datatype can populate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataElement {
    pub name: &'static str,
    pub desc: &'static str,
    pub readonly: bool,
    pub visible: bool,
}

/// Failures while extracting metadata from a dataset file
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("failed to read dataset file: {0}")]
    Io(#[from] io::Error),

    #[error("no '{0}' header found")]
    MissingHeader(String),

    #[error("metadata key '{0}' not found")]
    MissingKey(String),
}

/// A dataset file together with the display fields datatypes fill in
#[derive(Debug, Clone, Default)]
pub struct DatasetInstance {
    pub file_name: PathBuf,
    pub purged: bool,
    pub metadata: BTreeMap<String, String>,
    pub peek: Option<String>,
    pub info: Option<String>,
    pub blurb: Option<String>,
}

impl DatasetInstance {
    pub fn new(file_name: impl Into<PathBuf>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    /// Metadata value or an empty string when unset
    pub fn meta(&self, name: &str) -> &str {
        self.metadata.get(name).map(String::as_str).unwrap_or("")
    }

    pub(crate) fn mark_purged_peek(&mut self) {
        self.peek = Some("file does not exist".to_string());
        self.blurb = Some("file purged from disk".to_string());
    }
}

/// Behaviour shared by every datatype plugin
pub trait Datatype: Send + Sync {
    /// Canonical file extension of the format
    fn file_ext(&self) -> &'static str;

    /// Compression the stored files use, if any
    fn compressed_format(&self) -> Option<&'static str> {
        None
    }

    fn metadata_elements(&self) -> &'static [MetadataElement] {
        &[]
    }

    /// Decide from the leading content whether a file is of this format
    fn sniff_prefix(&self, prefix: &FilePrefix) -> bool;

    fn sniff(&self, path: &Path) -> io::Result<bool> {
        Ok(self.sniff_prefix(&FilePrefix::from_path(path)?))
    }

    /// Populate `dataset.metadata` from the file
    fn set_meta(&self, _dataset: &mut DatasetInstance) -> Result<(), MetadataError> {
        Ok(())
    }

    /// Populate peek, info and blurb for display
    fn set_peek(&self, dataset: &mut DatasetInstance) {
        if dataset.purged {
            dataset.mark_purged_peek();
            return;
        }
        dataset.peek = Some(file_peek_or_message(&dataset.file_name));
    }
}

/// Peek text, falling back to the read error for display
pub(crate) fn file_peek_or_message(path: &Path) -> String {
    sniff::get_file_peek(path).unwrap_or_else(|e| {
        tracing::warn!("⚠️ Could not peek {}: {}", path.display(), e);
        format!("could not read file: {}", e)
    })
}

/// Plain text: never claimed by sniffing, used as the text fallback
#[derive(Debug, Default, Clone, Copy)]
pub struct Text;

impl Datatype for Text {
    fn file_ext(&self) -> &'static str {
        "txt"
    }

    fn sniff_prefix(&self, _prefix: &FilePrefix) -> bool {
        false
    }
}
