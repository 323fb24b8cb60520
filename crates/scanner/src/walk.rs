//! Recursive library-root traversal.
//!
//! An iterative, stack-based walk over `tokio::fs::read_dir`. The walk is
//! fail-fast: the first traversal or read error aborts the whole scan and
//! no partial file list escapes. A half-observed tree would otherwise look
//! identical to a fully-scanned one to the reconciler.

use crate::digest::digest_file;
use crate::error::{ErrorKind, Result};
use crate::file::{DiscoveredFile, is_model_file, lowercase_extension, mime_type};
use std::path::Path;
use tokio::fs;

fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
        _ => ErrorKind::Io(e),
    }
}

/// Walk a library root and produce a descriptor for every supported
/// model file underneath it.
///
/// Directories and files outside [`SUPPORTED_EXTENSIONS`](crate::SUPPORTED_EXTENSIONS)
/// are silently skipped; symlinks and other non-regular entries are
/// dropped the same way. Output order follows the traversal and is not
/// guaranteed - the reconciler imposes its own deterministic ordering.
pub async fn scan_root(root: impl AsRef<Path>) -> Result<Vec<DiscoveredFile>> {
    let root = root.as_ref();
    if !root.is_dir() {
        exn::bail!(ErrorKind::InvalidRoot(root.to_path_buf()));
    }

    let mut discovered = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(current) = stack.pop() {
        let mut entries = fs::read_dir(&current).await.map_err(|e| map_io_error(e, &current))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| map_io_error(e, &current))? {
            let path = entry.path();
            let metadata = entry.metadata().await.map_err(|e| map_io_error(e, &path))?;
            if metadata.is_dir() {
                stack.push(path);
                continue;
            }
            if !metadata.is_file() || !is_model_file(&path) {
                continue;
            }
            let digest = digest_file(&path).await?;
            let mime = lowercase_extension(&path).as_deref().and_then(mime_type);
            tracing::debug!(path = %path.display(), size = metadata.len(), "discovered model file");
            discovered.push(DiscoveredFile {
                path,
                size: metadata.len(),
                digest,
                mime_type: mime,
            });
        }
    }
    tracing::debug!(root = %root.display(), files = discovered.len(), "scan walk complete");
    Ok(discovered)
}
