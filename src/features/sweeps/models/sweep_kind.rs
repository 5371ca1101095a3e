use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// The recurring background passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SweepKind {
    /// Trash files past their time or download limit
    Expiration,
    /// Purge files trashed longer than the retention window
    TrashPurge,
    /// Delete upload requests whose deadline plus grace has passed
    FileRequestPurge,
    /// Purge accounts soft-deleted longer than the purge window
    AccountPurge,
    /// Trim the audit log by age and size
    AuditPurge,
}

impl SweepKind {
    pub const ALL: [SweepKind; 5] = [
        SweepKind::Expiration,
        SweepKind::TrashPurge,
        SweepKind::FileRequestPurge,
        SweepKind::AccountPurge,
        SweepKind::AuditPurge,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SweepKind::Expiration => "expiration",
            SweepKind::TrashPurge => "trash-purge",
            SweepKind::FileRequestPurge => "file-request-purge",
            SweepKind::AccountPurge => "account-purge",
            SweepKind::AuditPurge => "audit-purge",
        }
    }
}

impl fmt::Display for SweepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SweepKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SweepKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown sweep: {}", s))
    }
}
