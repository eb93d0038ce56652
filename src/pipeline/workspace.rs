//! Per-request scratch directories.
//!
//! Every render gets its own uniquely named directory under the configured
//! root (`svg-XXXXXX`, `png-XXXXXX`, …). All tool inputs and outputs live in
//! it, so concurrent requests never see each other's files.
//!
//! Removal is tied to ownership: [`Workspace::destroy`] on the normal path,
//! `Drop` on every other one (early return, panic, a cancelled future).

use crate::error::RenderError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// An isolated, uniquely named directory owned by one request.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl Workspace {
    /// Allocate a fresh empty directory under `root`.
    ///
    /// `root` is created if missing. The random suffix comes from
    /// [`tempfile`], which retries on collision, so two concurrent calls
    /// never return the same path.
    pub fn create(root: &Path, prefix: &str) -> Result<Self, RenderError> {
        std::fs::create_dir_all(root).map_err(|e| RenderError::WorkspaceCreate {
            root: root.to_path_buf(),
            source: e,
        })?;

        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(root)
            .map_err(|e| RenderError::WorkspaceCreate {
                root: root.to_path_buf(),
                source: e,
            })?;

        let path = dir.path().to_path_buf();
        debug!("Created workspace {}", path.display());
        Ok(Self {
            path,
            dir: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Directory name without the root, for log lines.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Remove the directory and everything in it.
    pub fn destroy(mut self) -> Result<(), RenderError> {
        match self.dir.take() {
            Some(dir) => dir.close().map_err(|e| RenderError::WorkspaceRemove {
                path: self.path.clone(),
                source: e,
            }),
            None => Ok(()),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                warn!("Failed to remove workspace {}: {}", self.path.display(), e);
            }
        }
    }
}
