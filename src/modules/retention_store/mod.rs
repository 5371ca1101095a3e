//! Retention store
//!
//! Transactional persistence for files, accounts, download logs, file
//! requests and the audit log. Every lifecycle transition is a single
//! conditional statement, so a transition either applies atomically or
//! reports why it did not (`AlreadyApplied`, `NotFound`, `NotEligible`);
//! no lock is ever held between reading due items and acting on them.

mod postgres;

pub use postgres::PgRetentionStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::accounts::models::{Account, AccountKind};
use crate::features::audit::models::{AuditEntry, AuditFilter, NewAuditEntry};
use crate::features::file_requests::models::FileRequest;
use crate::features::files::models::{File, NewFile};
use crate::shared::lifecycle::TransitionOutcome;

#[async_trait]
pub trait RetentionStore: Send + Sync {
    // -------------------------------------------------------------------------
    // Files
    // -------------------------------------------------------------------------

    async fn insert_file(&self, file: &NewFile) -> Result<File>;

    async fn get_file(&self, id: &str) -> Result<Option<File>>;

    /// Non-trashed files whose time or download limit is exhausted at `now`,
    /// ordered by id and starting strictly after `after`
    async fn list_files_due_for_trash(
        &self,
        now: DateTime<Utc>,
        after: Option<&str>,
        limit: i64,
    ) -> Result<Vec<File>>;

    /// Trashed files soft-deleted at or before `cutoff`, ordered by id
    async fn list_trashed_files_before(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<&str>,
        limit: i64,
    ) -> Result<Vec<File>>;

    /// Files owned by a user regardless of state, ordered by id
    async fn list_files_by_owner(
        &self,
        owner_id: Uuid,
        after: Option<&str>,
        limit: i64,
    ) -> Result<Vec<File>>;

    /// Set the soft-delete timestamp and actor if the file is not trashed yet
    async fn mark_file_trashed(
        &self,
        id: &str,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome>;

    /// Clear the soft-delete timestamp and actor if the file is trashed
    async fn clear_file_trash(&self, id: &str) -> Result<TransitionOutcome>;

    /// Consume one download of an active file and append a download log row
    async fn record_download(
        &self,
        file_id: &str,
        download_account_id: Option<Uuid>,
        email: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome>;

    /// Delete a file trashed at or before `cutoff` together with its download
    /// logs, in one transaction. A file restored in the meantime keeps both.
    async fn purge_trashed_file(&self, id: &str, cutoff: DateTime<Utc>)
        -> Result<TransitionOutcome>;

    /// Delete a file and its download logs regardless of state (owner purge
    /// only), in one transaction
    async fn purge_file(&self, id: &str) -> Result<TransitionOutcome>;

    /// Sum of `size_bytes` over the owner's files that are not trashed
    async fn sum_untrashed_file_bytes(&self, owner_id: Uuid) -> Result<i64>;

    async fn set_consumed_storage(&self, user_id: Uuid, megabytes: i64)
        -> Result<TransitionOutcome>;

    // -------------------------------------------------------------------------
    // Accounts
    // -------------------------------------------------------------------------

    async fn get_account(&self, kind: AccountKind, id: Uuid) -> Result<Option<Account>>;

    /// Anonymize, deactivate and stamp the account if not soft-deleted yet.
    /// The pre-deletion address moves to `original_email`.
    async fn mark_account_soft_deleted(
        &self,
        kind: AccountKind,
        id: Uuid,
        anonymized_email: &str,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome>;

    /// Replace the email on a download account's historical logs
    async fn anonymize_download_logs(
        &self,
        account_id: Uuid,
        anonymized_email: &str,
    ) -> Result<u64>;

    async fn list_accounts_soft_deleted_before(
        &self,
        kind: AccountKind,
        cutoff: DateTime<Utc>,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Account>>;

    async fn delete_download_logs_for_account(&self, account_id: Uuid) -> Result<u64>;

    async fn delete_file_requests_by_owner(&self, owner_id: Uuid) -> Result<u64>;

    /// Delete an account soft-deleted at or before `cutoff`
    async fn delete_soft_deleted_account(
        &self,
        kind: AccountKind,
        id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<TransitionOutcome>;

    // -------------------------------------------------------------------------
    // File requests
    // -------------------------------------------------------------------------

    /// Requests whose deadline lies strictly before `cutoff`, ordered by id
    async fn list_file_requests_expired_before(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<&str>,
        limit: i64,
    ) -> Result<Vec<FileRequest>>;

    async fn delete_expired_file_request(
        &self,
        id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<TransitionOutcome>;

    // -------------------------------------------------------------------------
    // Audit log
    // -------------------------------------------------------------------------

    async fn append_audit(&self, entry: &NewAuditEntry, at: DateTime<Utc>)
        -> Result<AuditEntry>;

    /// Matching entries newest first, plus the total match count
    async fn list_audit(
        &self,
        filter: &AuditFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<AuditEntry>, i64)>;

    async fn delete_audit_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    async fn audit_total_size(&self) -> Result<i64>;

    /// `(id, entry_size)` of the oldest entries, oldest first
    async fn oldest_audit_sizes(&self, limit: i64) -> Result<Vec<(Uuid, i64)>>;

    async fn delete_audit_entries(&self, ids: &[Uuid]) -> Result<u64>;
}
