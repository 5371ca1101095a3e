use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::shared::lifecycle::Actor;

/// Action tag recorded for every lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    FileUploaded,
    FileTrashed,
    FileRestored,
    FilePurged,
    FileRequestPurged,
    QuotaRecomputed,
    UserSoftDeleted,
    UserPurged,
    DownloadAccountSoftDeleted,
    DownloadAccountPurged,
    AuditPurged,
}

impl AuditAction {
    pub const ALL: [AuditAction; 11] = [
        AuditAction::FileUploaded,
        AuditAction::FileTrashed,
        AuditAction::FileRestored,
        AuditAction::FilePurged,
        AuditAction::FileRequestPurged,
        AuditAction::QuotaRecomputed,
        AuditAction::UserSoftDeleted,
        AuditAction::UserPurged,
        AuditAction::DownloadAccountSoftDeleted,
        AuditAction::DownloadAccountPurged,
        AuditAction::AuditPurged,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::FileUploaded => "FILE_UPLOADED",
            AuditAction::FileTrashed => "FILE_TRASHED",
            AuditAction::FileRestored => "FILE_RESTORED",
            AuditAction::FilePurged => "FILE_PURGED",
            AuditAction::FileRequestPurged => "FILE_REQUEST_PURGED",
            AuditAction::QuotaRecomputed => "QUOTA_RECOMPUTED",
            AuditAction::UserSoftDeleted => "USER_SOFT_DELETED",
            AuditAction::UserPurged => "USER_PURGED",
            AuditAction::DownloadAccountSoftDeleted => "DOWNLOAD_ACCOUNT_SOFT_DELETED",
            AuditAction::DownloadAccountPurged => "DOWNLOAD_ACCOUNT_PURGED",
            AuditAction::AuditPurged => "AUDIT_PURGED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown audit action: {}", s))
    }
}

/// Kind of subject an audit entry refers to (soft reference, no FK)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    File,
    User,
    DownloadAccount,
    FileRequest,
    AuditLog,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::File => "file",
            EntityType::User => "user",
            EntityType::DownloadAccount => "download_account",
            EntityType::FileRequest => "file_request",
            EntityType::AuditLog => "audit_log",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database model for the append-only audit log
#[derive(Debug, Clone, FromRow)]
pub struct AuditEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub actor_id: String,
    pub actor_email: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub success: bool,
    pub details: Value,
    /// Approximate stored size, used by the size-bounded purge
    pub entry_size: i64,
}

/// Audit entry about to be appended
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub actor_id: String,
    pub actor_email: Option<String>,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub success: bool,
    pub details: Value,
}

impl NewAuditEntry {
    pub fn new(
        action: AuditAction,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        actor: &Actor,
    ) -> Self {
        Self {
            actor_id: actor.id(),
            actor_email: actor.email().map(str::to_string),
            action,
            entity_type,
            entity_id: entity_id.into(),
            success: true,
            details: json!({}),
        }
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    /// Add a detail field; values that fail to serialize are dropped
    pub fn with_detail(mut self, key: &str, value: impl Serialize) -> Self {
        if let (Value::Object(map), Ok(v)) = (&mut self.details, serde_json::to_value(value)) {
            map.insert(key.to_string(), v);
        }
        self
    }

    /// Bytes this entry occupies once stored, approximated from its text
    /// columns and serialized details
    pub fn approximate_size(&self) -> i64 {
        let text = self.actor_id.len()
            + self.actor_email.as_deref().map_or(0, str::len)
            + self.action.as_str().len()
            + self.entity_type.as_str().len()
            + self.entity_id.len()
            + self.details.to_string().len();
        // uuid + timestamp + success flag + size column
        (text + 16 + 8 + 1 + 8) as i64
    }
}

/// Narrowing criteria for audit queries
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<String>,
    pub action: Option<AuditAction>,
}
