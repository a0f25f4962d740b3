/// Datatypes registry
///
/// Maps file extensions to mimetypes and datatype plugins, and auto-detects
/// the extension of new datasets by running the registered sniffers in order.

use super::{AthenaProject, Datatype, FeffInput, FilePrefix, Text};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// A registered extension
#[derive(Clone)]
pub struct DatatypeEntry {
    pub extension: String,
    pub mimetype: String,
    pub datatype: Option<Arc<dyn Datatype>>,
}

impl std::fmt::Debug for DatatypeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatatypeEntry")
            .field("extension", &self.extension)
            .field("mimetype", &self.mimetype)
            .field("has_datatype", &self.datatype.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct DatatypesRegistry {
    entries: HashMap<String, DatatypeEntry>,
    /// Extensions whose datatypes take part in auto-detection, in order
    sniff_order: Vec<String>,
}

impl Default for DatatypesRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl DatatypesRegistry {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            sniff_order: Vec::new(),
        }
    }

    /// Registry with the bundled datatypes and common image mimetypes
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();

        registry.register("prj", "application/gzip", Some(Arc::new(AthenaProject)), true);
        registry.register("inp", "text/plain", Some(Arc::new(FeffInput)), true);
        registry.register("txt", "text/plain", Some(Arc::new(Text)), false);
        registry.register("tabular", "text/plain", Some(Arc::new(Text)), false);
        registry.register("data", "application/octet-stream", None, false);

        for (ext, mime) in [
            ("png", "image/png"),
            ("jpg", "image/jpeg"),
            ("jpeg", "image/jpeg"),
            ("gif", "image/gif"),
            ("svg", "image/svg+xml"),
            ("bmp", "image/bmp"),
            ("ico", "image/x-icon"),
        ] {
            registry.register(ext, mime, None, false);
        }

        registry
    }

    /// Register (or replace) an extension
    pub fn register(
        &mut self,
        extension: &str,
        mimetype: &str,
        datatype: Option<Arc<dyn Datatype>>,
        sniffable: bool,
    ) {
        let key = extension.to_ascii_lowercase();
        if sniffable && datatype.is_some() && !self.sniff_order.contains(&key) {
            self.sniff_order.push(key.clone());
        }
        self.entries.insert(
            key.clone(),
            DatatypeEntry {
                extension: key,
                mimetype: mimetype.to_string(),
                datatype,
            },
        );
    }

    pub fn get_mimetype_by_extension(&self, extension: &str) -> Option<&str> {
        self.entries
            .get(&extension.to_ascii_lowercase())
            .map(|entry| entry.mimetype.as_str())
    }

    pub fn get_datatype_by_extension(&self, extension: &str) -> Option<Arc<dyn Datatype>> {
        self.entries
            .get(&extension.to_ascii_lowercase())
            .and_then(|entry| entry.datatype.clone())
    }

    /// Detect the extension of a file from its content
    pub fn sniff_prefix(&self, prefix: &FilePrefix) -> String {
        for ext in &self.sniff_order {
            let Some(datatype) = self.entries.get(ext).and_then(|e| e.datatype.as_ref()) else {
                continue;
            };
            if datatype.sniff_prefix(prefix) {
                tracing::debug!("🔍 Sniffed datatype: {}", ext);
                return ext.clone();
            }
        }

        if prefix.is_binary() {
            "data".to_string()
        } else {
            "txt".to_string()
        }
    }

    pub fn sniff(&self, path: &Path) -> std::io::Result<String> {
        Ok(self.sniff_prefix(&FilePrefix::from_path(path)?))
    }

    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }
}
