use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::features::audit::models::EntityType;
use crate::shared::constants::{ANONYMIZED_EMAIL_DOMAIN, ANONYMIZED_EMAIL_TAG};

/// The two account tables that share the soft-delete/anonymize/purge policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Uploading account that owns files
    User,
    /// Download-only account
    DownloadAccount,
}

impl AccountKind {
    pub fn table(self) -> &'static str {
        match self {
            AccountKind::User => "users",
            AccountKind::DownloadAccount => "download_accounts",
        }
    }

    pub fn entity_type(self) -> EntityType {
        match self {
            AccountKind::User => EntityType::User,
            AccountKind::DownloadAccount => EntityType::DownloadAccount,
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountKind::User => write!(f, "user"),
            AccountKind::DownloadAccount => write!(f, "download_account"),
        }
    }
}

/// Database model shared by `users` and `download_accounts`.
///
/// `consumed_storage_mb` is only populated for users.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    /// Address before anonymization; set once the account is soft-deleted
    pub original_email: Option<String>,
    pub is_active: bool,
    pub consumed_storage_mb: Option<i64>,
    pub soft_deleted_at: Option<DateTime<Utc>>,
    pub soft_deleted_by: Option<String>,
}

impl Account {
    /// Soft-deleted at or before `cutoff`
    pub fn soft_deleted_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.soft_deleted_at
            .is_some_and(|deleted_at| deleted_at <= cutoff)
    }
}

/// Placeholder address written over a soft-deleted account's email.
///
/// The account id keeps placeholders unique even when two accounts once
/// shared an address. Idempotent, and it frees the original address for a
/// new registration.
pub fn anonymize_email(email: &str, id: Uuid) -> String {
    if is_anonymized(email) {
        return email.to_string();
    }
    format!(
        "{}{}_{}{}",
        ANONYMIZED_EMAIL_TAG,
        id.simple(),
        email.replace('@', "_at_"),
        ANONYMIZED_EMAIL_DOMAIN
    )
}

fn is_anonymized(email: &str) -> bool {
    email.starts_with(ANONYMIZED_EMAIL_TAG) && email.ends_with(ANONYMIZED_EMAIL_DOMAIN)
}
