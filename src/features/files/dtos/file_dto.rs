use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::features::files::models::{File, FileState};
use crate::shared::lifecycle::TransitionOutcome;

/// Largest accepted upload, in bytes
pub const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Multipart upload form. The file name is taken from the `file` part.
#[derive(Debug, Default, Validate, ToSchema)]
pub struct UploadFileForm {
    /// The file to upload
    #[schema(value_type = String, format = Binary)]
    #[schema(content_media_type = "application/octet-stream")]
    #[validate(length(min = 1, message = "File must not be empty"))]
    pub file: Vec<u8>,
    /// Hours until the file expires; omitted means no time limit
    #[validate(range(min = 1, message = "Expiry must be at least one hour"))]
    pub expires_in_hours: Option<i64>,
    /// Downloads allowed; omitted means unlimited
    #[validate(range(min = 1, message = "At least one download must be allowed"))]
    pub max_downloads: Option<i32>,
}

/// Query params for a download
#[derive(Debug, Deserialize, IntoParams)]
pub struct DownloadQueryParams {
    /// Download account the log row is attributed to
    pub download_account_id: Option<Uuid>,
}

/// A stored file as seen at request time
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileDto {
    pub id: String,
    pub owner_id: Uuid,
    pub file_name: String,
    pub size_bytes: i64,
    /// Hex SHA-256 of the content
    pub content_hash: String,
    pub uploaded_at: DateTime<Utc>,
    /// `None` when the file never expires by time
    pub expires_at: Option<DateTime<Utc>>,
    /// `None` when downloads are unlimited
    pub downloads_remaining: Option<i32>,
    pub download_count: i64,
    pub state: FileState,
}

impl FileDto {
    pub fn new(file: File, state: FileState) -> Self {
        Self {
            downloads_remaining: (!file.unlimited_downloads).then_some(file.downloads_remaining),
            expires_at: file.expires_at.filter(|_| !file.unlimited_time),
            id: file.id,
            owner_id: file.owner_id,
            file_name: file.file_name,
            size_bytes: file.size_bytes,
            content_hash: file.content_hash,
            uploaded_at: file.uploaded_at,
            download_count: file.download_count,
            state,
        }
    }
}

/// Result of a trash or restore request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileTransitionDto {
    pub file_id: String,
    /// `applied` when the file changed state; the other values mean the
    /// request was a no-op
    pub outcome: TransitionOutcome,
}

/// Consumed storage after a recompute
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuotaDto {
    pub user_id: Uuid,
    /// Sum of the user's untrashed file sizes in whole megabytes
    pub consumed_storage_mb: i64,
}
