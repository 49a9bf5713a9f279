use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use log::warn;
use uuid::Uuid;
use crate::download::config::DownloadConfig;

/// Per-operation directory holding the chunk temp files.
///
/// Removed explicitly with [`TempChunkDir::remove`] on every terminal path; dropping it unremoved
/// (e.g. the operation future was dropped) removes it synchronously.
#[derive(Debug)]
pub struct TempChunkDir {
    path: PathBuf,
    removed: bool,
}

impl TempChunkDir {
    /// Unique, not yet created directory under the configured temp root
    pub fn allocate_path(config: &DownloadConfig) -> PathBuf {
        config.temp_root().join(Uuid::new_v4().to_string())
    }

    pub async fn create(path: PathBuf) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { path, removed: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn remove(mut self) -> std::io::Result<()> {
        self.removed = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

impl Drop for TempChunkDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(err) = std::fs::remove_dir_all(&self.path) {
            if err.kind() != ErrorKind::NotFound {
                warn!("Failed to remove chunk directory {}: {}", self.path.display(), err);
            }
        }
    }
}
