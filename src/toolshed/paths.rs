/// Repository-contained path resolution
///
/// Requested asset paths come straight from the URL. A path is served only
/// when it stays inside the repository directory, both lexically and after
/// symlinks are resolved.

use std::{
    io,
    path::{Component, Path, PathBuf},
};

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("path '{0}' escapes the repository directory")]
    Escapes(String),

    #[error("path '{0}' does not exist")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Normalize `relative` without touching the filesystem
///
/// Leading separators are dropped; `..` may only cancel a preceding segment.
fn normalize_relative(relative: &str) -> Result<PathBuf, PathError> {
    let trimmed = relative.trim_start_matches('/');
    let mut normalized = PathBuf::new();

    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(segment) => normalized.push(segment),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(PathError::Escapes(relative.to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::Escapes(relative.to_string()));
            }
        }
    }

    Ok(normalized)
}

/// Resolve `relative` under `root`, refusing anything that leaves `root`
///
/// Only metadata lookups happen here; no file content is opened.
pub fn resolve_contained(root: &Path, relative: &str) -> Result<PathBuf, PathError> {
    let normalized = normalize_relative(relative)?;

    let canonical_root = root.canonicalize().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => PathError::NotFound(root.display().to_string()),
        _ => PathError::Io(e),
    })?;

    let candidate = canonical_root.join(&normalized);
    let resolved = candidate.canonicalize().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => PathError::NotFound(relative.to_string()),
        _ => PathError::Io(e),
    })?;

    if !resolved.starts_with(&canonical_root) {
        return Err(PathError::Escapes(relative.to_string()));
    }

    Ok(resolved)
}
