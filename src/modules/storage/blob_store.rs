use async_trait::async_trait;

use crate::core::error::Result;

/// Outcome of a blob deletion. A missing blob is not a failure: purges
/// are retried against rows whose bytes are already gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobDeleteOutcome {
    Deleted,
    NotFound,
}

/// Physical store for uploaded file bytes, keyed by file id
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put_blob(&self, id: &str, data: &[u8]) -> Result<()>;

    /// `None` when no blob exists for `id`
    async fn read_blob(&self, id: &str) -> Result<Option<Vec<u8>>>;

    async fn delete_blob(&self, id: &str) -> Result<BlobDeleteOutcome>;

    fn backend_name(&self) -> &'static str;
}

/// File ids become object keys and file names, so only a conservative
/// character set is accepted
pub fn is_valid_blob_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
