use std::fmt;

use super::AccountKind;

/// One step of an account purge. Steps run in plan order and each is
/// retryable on its own: a failed step aborts the purge of that account,
/// and the next run starts the plan over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStep {
    /// Purge every file still owned by the user (blob, logs, row)
    PurgeOwnedFiles,
    DeleteOwnedFileRequests,
    DeleteDownloadLogs,
    /// Conditional delete of the account row itself, always last
    DeleteAccountRow,
}

const USER_PLAN: [CleanupStep; 3] = [
    CleanupStep::PurgeOwnedFiles,
    CleanupStep::DeleteOwnedFileRequests,
    CleanupStep::DeleteAccountRow,
];

const DOWNLOAD_ACCOUNT_PLAN: [CleanupStep; 2] = [
    CleanupStep::DeleteDownloadLogs,
    CleanupStep::DeleteAccountRow,
];

impl CleanupStep {
    pub fn plan(kind: AccountKind) -> &'static [CleanupStep] {
        match kind {
            AccountKind::User => &USER_PLAN,
            AccountKind::DownloadAccount => &DOWNLOAD_ACCOUNT_PLAN,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CleanupStep::PurgeOwnedFiles => "purge_owned_files",
            CleanupStep::DeleteOwnedFileRequests => "delete_owned_file_requests",
            CleanupStep::DeleteDownloadLogs => "delete_download_logs",
            CleanupStep::DeleteAccountRow => "delete_account_row",
        }
    }
}

impl fmt::Display for CleanupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
