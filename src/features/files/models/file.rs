use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle state of a file at a given instant.
///
/// `Purged` is not represented: a purged file has no row left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Active,
    /// Time or download limit exhausted, waiting for the expiration sweep
    Expired,
    /// Soft-deleted and recoverable until the trash retention window ends
    Trashed,
}

/// Database model for files
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct File {
    pub id: String,
    pub owner_id: Uuid,
    pub file_name: String,
    pub size_bytes: i64,
    pub content_hash: String,
    pub uploaded_at: DateTime<Utc>,
    /// `None` means the file never expires by time
    pub expires_at: Option<DateTime<Utc>>,
    pub unlimited_time: bool,
    pub downloads_remaining: i32,
    pub unlimited_downloads: bool,
    /// Aggregate counter, kept when download logs are purged
    pub download_count: i64,
    pub soft_deleted_at: Option<DateTime<Utc>>,
    pub soft_deleted_by: Option<String>,
}

impl File {
    pub fn is_trashed(&self) -> bool {
        self.soft_deleted_at.is_some()
    }

    fn time_limit_exceeded(&self, now: DateTime<Utc>) -> bool {
        !self.unlimited_time && self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    fn download_limit_exceeded(&self) -> bool {
        !self.unlimited_downloads && self.downloads_remaining <= 0
    }

    pub fn state(&self, now: DateTime<Utc>) -> FileState {
        if self.is_trashed() {
            FileState::Trashed
        } else if self.time_limit_exceeded(now) || self.download_limit_exceeded() {
            FileState::Expired
        } else {
            FileState::Active
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == FileState::Active
    }

    /// Trashed at or before `cutoff`, i.e. for at least `now - cutoff`
    pub fn trashed_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.soft_deleted_at
            .is_some_and(|deleted_at| deleted_at <= cutoff)
    }
}

/// Data for registering a freshly uploaded file
#[derive(Debug, Clone)]
pub struct NewFile {
    pub id: String,
    pub owner_id: Uuid,
    pub file_name: String,
    pub size_bytes: i64,
    pub content_hash: String,
    pub uploaded_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub unlimited_time: bool,
    pub downloads_remaining: i32,
    pub unlimited_downloads: bool,
}

/// Upload limits chosen by the uploader
#[derive(Debug, Clone, Copy)]
pub struct FileLimits {
    pub expires_at: Option<DateTime<Utc>>,
    pub unlimited_time: bool,
    pub downloads_remaining: i32,
    pub unlimited_downloads: bool,
}

/// Bytes of a downloaded file
#[derive(Debug, Clone)]
pub struct FileContent {
    pub file_name: String,
    pub data: Vec<u8>,
}
