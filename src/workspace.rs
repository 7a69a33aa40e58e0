//! Scoped scratch directory for one compression run.
//!
//! Every intermediate JPEG lives inside a [`Workspace`]. The directory is
//! backed by a [`TempDir`], so it is removed when the workspace is dropped:
//! on success, on error propagation through `?`, and on unwinding panics.

use crate::error::CompressError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Temporary directory owned exclusively by one run.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace under the system temp directory.
    pub fn new() -> Result<Self, CompressError> {
        let dir = tempfile::Builder::new()
            .prefix("tierpress-")
            .tempdir()
            .map_err(|e| CompressError::Internal(format!("tempdir: {e}")))?;
        debug!("Created workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Root directory of the workspace.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now, reporting failures instead of ignoring them.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove workspace {}: {}", path.display(), e);
        }
    }
}

/// `page_{i}.jpg` inside `dir`.
///
/// Names are unique per page, so the two tiers never collide.
pub fn page_image_path(dir: &Path, page: usize) -> PathBuf {
    dir.join(format!("page_{page}.jpg"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_removed_on_drop() {
        let path = {
            let ws = Workspace::new().unwrap();
            std::fs::write(page_image_path(ws.path(), 0), b"x").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn directory_removed_on_close() {
        let ws = Workspace::new().unwrap();
        let path = ws.path().to_path_buf();
        assert!(path.is_dir());
        ws.close();
        assert!(!path.exists());
    }

    #[test]
    fn page_paths_are_distinct() {
        let ws = Workspace::new().unwrap();
        assert_ne!(
            page_image_path(ws.path(), 1),
            page_image_path(ws.path(), 10)
        );
        assert!(page_image_path(ws.path(), 3)
            .to_string_lossy()
            .ends_with("page_3.jpg"));
    }
}
