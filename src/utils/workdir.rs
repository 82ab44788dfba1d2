use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

/// Source of scratch directories for one external-tool invocation
pub trait WorkspaceProvider: Send + Sync {
    fn provision(&self) -> Result<WorkingDirectory>;
}

/// Uniquely named directory removed when dropped
#[derive(Debug)]
pub struct WorkingDirectory {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl WorkingDirectory {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkingDirectory {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => tracing::trace!(path = %self.path.display(), "Removed working directory"),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove working directory"
                ),
            }
        }
    }
}

/// Provisions directories under the system temp dir, or under `root` if set
#[derive(Debug, Clone)]
pub struct TempWorkspace {
    root: Option<PathBuf>,
    prefix: String,
}

impl Default for TempWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TempWorkspace {
    pub fn new() -> Self {
        Self {
            root: None,
            prefix: "imreg".to_string(),
        }
    }

    pub fn with_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }
}

impl WorkspaceProvider for TempWorkspace {
    fn provision(&self) -> Result<WorkingDirectory> {
        let prefix = format!("{}-{}-", self.prefix, Uuid::new_v4().simple());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let dir = match &self.root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(Error::ResourceProvisioning)?;

        let path = dir.path().to_path_buf();
        tracing::debug!(path = %path.display(), "Provisioned working directory");
        Ok(WorkingDirectory {
            dir: Some(dir),
            path,
        })
    }
}
