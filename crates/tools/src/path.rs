//! Path validation: keeps file tools inside the workspace.
//!
//! Relative paths are taken relative to the workspace. Symlinks are resolved
//! through the nearest existing ancestor so a link pointing outside the
//! workspace cannot be used to escape it.

use std::path::{Component, Path, PathBuf};

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("path must be within workspace: {path}")]
    OutsideWorkspace { path: String },

    #[error("path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("failed to resolve path '{path}': {reason}")]
    CanonicalizeFailed { path: String, reason: String },
}

/// Anchor `path` at the workspace when it is relative.
pub fn resolve(workspace: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        workspace.join(p)
    }
}

/// Resolve `path` and require it to stay under `workspace`.
///
/// Returns the resolved path on success. The target itself need not exist.
pub fn confine(workspace: &Path, path: &str) -> Result<PathBuf, PathValidationError> {
    if Path::new(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(PathValidationError::PathTraversal { path: path.into() });
    }

    let root = canonical_prefix(workspace).map_err(|e| PathValidationError::CanonicalizeFailed {
        path: workspace.display().to_string(),
        reason: e.to_string(),
    })?;
    let target = canonical_prefix(&resolve(workspace, path)).map_err(|e| {
        PathValidationError::CanonicalizeFailed {
            path: path.into(),
            reason: e.to_string(),
        }
    })?;

    if !target.starts_with(&root) {
        return Err(PathValidationError::OutsideWorkspace { path: path.into() });
    }
    Ok(target)
}

/// Canonicalize the longest existing prefix of `path` and re-attach the
/// missing tail.
fn canonical_prefix(path: &Path) -> std::io::Result<PathBuf> {
    let mut existing = path;
    let mut tail = Vec::new();
    loop {
        if existing.exists() {
            let mut resolved = existing.canonicalize()?;
            for part in tail.iter().rev() {
                resolved.push(part);
            }
            return Ok(resolved);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            // Nothing on disk at all; compare the raw path.
            _ => return Ok(path.to_path_buf()),
        }
    }
}
