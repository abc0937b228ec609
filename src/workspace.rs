//! Per-execution scratch files.
//!
//! Every execution gets its own `code_<uuid><ext>` file under a shared
//! scratch root. Names are unique, so concurrent executions never contend
//! and nothing needs locking. The file is removed exactly once: either by
//! [`Workspace::release`] or, if that never runs, when the guard is dropped.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::language::LanguageProfile;

/// Failure to materialize a snippet on disk.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Failed to create scratch directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to write scratch file {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Shared directory under which scratch files are created.
#[derive(Debug, Clone)]
pub struct ScratchRoot {
    dir: PathBuf,
}

impl ScratchRoot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Create a fresh scratch file holding `code`.
    pub async fn acquire(
        &self,
        profile: &LanguageProfile,
        code: &str,
    ) -> Result<Workspace, WorkspaceError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| WorkspaceError::CreateDir {
                path: self.dir.clone(),
                source,
            })?;

        let file_name = format!("code_{}{}", Uuid::new_v4(), profile.extension);
        let file_path = self.dir.join(&file_name);

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&file_path)
            .await
            .map_err(|source| WorkspaceError::Write {
                path: file_path.clone(),
                source,
            })?;

        // From here on the guard owns the file and removes it on any error.
        let workspace = Workspace {
            directory: self.dir.clone(),
            file_name,
            file_path,
            removed: false,
        };

        let written = async {
            file.write_all(code.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        drop(file);

        if let Err(source) = written {
            return Err(WorkspaceError::Write {
                path: workspace.file_path.clone(),
                source,
            });
        }

        debug!(file = %workspace.file_name, bytes = code.len(), "Scratch file written");
        Ok(workspace)
    }
}

/// A scratch file owned by one execution.
#[derive(Debug)]
pub struct Workspace {
    directory: PathBuf,
    file_name: String,
    file_path: PathBuf,
    removed: bool,
}

impl Workspace {
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Remove the scratch file. Failures are logged, never returned.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if std::mem::replace(&mut self.removed, true) {
            return;
        }
        match std::fs::remove_file(&self.file_path) {
            Ok(()) => debug!(file = %self.file_name, "Scratch file removed"),
            Err(e) => {
                warn!(path = %self.file_path.display(), error = %e, "Failed to remove scratch file");
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.remove();
    }
}
