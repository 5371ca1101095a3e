//! Filesystem blob store: one file per blob, named by file id, under a
//! single directory.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

use super::blob_store::{is_valid_blob_id, BlobDeleteOutcome, BlobStore};
use crate::core::error::{AppError, Result};

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create the store, creating `root` if it does not exist
    pub async fn new(root: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create blob directory '{}': {}",
                root.display(),
                e
            ))
        })?;

        info!("Local blob store initialized at {}", root.display());
        Ok(Self { root })
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        if !is_valid_blob_id(id) {
            return Err(AppError::BadRequest(format!("Invalid file id: {}", id)));
        }
        Ok(self.root.join(id))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put_blob(&self, id: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(id)?;
        tokio::fs::write(&path, data).await.map_err(|e| {
            AppError::Storage(format!("Failed to write blob '{}': {}", path.display(), e))
        })?;

        debug!("Wrote blob {} ({} bytes)", id, data.len());
        Ok(())
    }

    async fn read_blob(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(id)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to read blob '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    async fn delete_blob(&self, id: &str) -> Result<BlobDeleteOutcome> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted blob {}", id);
                Ok(BlobDeleteOutcome::Deleted)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BlobDeleteOutcome::NotFound),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to delete blob '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
