//! In-memory doubles for the retention store, the blob store and the clock.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::core::config::RetentionConfig;
use crate::core::error::{AppError, Result};
use crate::features::accounts::models::{Account, AccountKind};
use crate::features::accounts::services::AccountLifecycleService;
use crate::features::audit::models::{AuditEntry, AuditFilter, NewAuditEntry};
use crate::features::audit::services::AuditService;
use crate::features::file_requests::models::FileRequest;
use crate::features::file_requests::services::FileRequestService;
use crate::features::files::models::{File, FileState, NewFile};
use crate::features::files::services::{FileLifecycleService, QuotaService};
use crate::features::sweeps::services::SweepService;
use crate::modules::retention_store::RetentionStore;
use crate::modules::storage::{BlobDeleteOutcome, BlobStore};
use crate::shared::clock::Clock;
use crate::shared::lifecycle::TransitionOutcome;

/// A row of the `download_logs` table
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadLog {
    pub id: i64,
    pub file_id: String,
    pub download_account_id: Option<Uuid>,
    pub email: Option<String>,
    pub downloaded_at: DateTime<Utc>,
}

// =============================================================================
// CLOCK
// =============================================================================

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// =============================================================================
// RETENTION STORE
// =============================================================================

#[derive(Default)]
struct MemoryState {
    files: BTreeMap<String, File>,
    users: BTreeMap<Uuid, Account>,
    download_accounts: BTreeMap<Uuid, Account>,
    download_logs: Vec<DownloadLog>,
    file_requests: BTreeMap<String, FileRequest>,
    audit: Vec<AuditEntry>,
    next_log_id: i64,
    failing_files: HashSet<String>,
    failing_accounts: HashSet<Uuid>,
    failing_listings: HashSet<AccountKind>,
    restore_before_purge: HashSet<String>,
    fail_audit: bool,
}

impl MemoryState {
    fn accounts(&mut self, kind: AccountKind) -> &mut BTreeMap<Uuid, Account> {
        match kind {
            AccountKind::User => &mut self.users,
            AccountKind::DownloadAccount => &mut self.download_accounts,
        }
    }

    fn check_file(&self, id: &str) -> Result<()> {
        if self.failing_files.contains(id) {
            return Err(AppError::Internal(format!(
                "injected failure for file {}",
                id
            )));
        }
        Ok(())
    }

    fn check_account(&self, id: Uuid) -> Result<()> {
        if self.failing_accounts.contains(&id) {
            return Err(AppError::Internal(format!(
                "injected failure for account {}",
                id
            )));
        }
        Ok(())
    }
}

/// `RetentionStore` backed by in-process maps, with per-entity failure
/// injection to exercise the "skip and continue" paths
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_user(&self, email: &str) -> Uuid {
        self.add_account(AccountKind::User, email)
    }

    pub fn add_download_account(&self, email: &str) -> Uuid {
        self.add_account(AccountKind::DownloadAccount, email)
    }

    fn add_account(&self, kind: AccountKind, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        let account = Account {
            id,
            email: email.to_string(),
            original_email: None,
            is_active: true,
            consumed_storage_mb: (kind == AccountKind::User).then_some(0),
            soft_deleted_at: None,
            soft_deleted_by: None,
        };
        self.state.lock().unwrap().accounts(kind).insert(id, account);
        id
    }

    pub fn put_file(&self, file: File) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(file.id.clone(), file);
    }

    pub fn put_file_request(&self, request: FileRequest) {
        self.state
            .lock()
            .unwrap()
            .file_requests
            .insert(request.id.clone(), request);
    }

    pub fn file(&self, id: &str) -> Option<File> {
        self.state.lock().unwrap().files.get(id).cloned()
    }

    pub fn files_of(&self, owner_id: Uuid) -> Vec<File> {
        self.state
            .lock()
            .unwrap()
            .files
            .values()
            .filter(|f| f.owner_id == owner_id)
            .cloned()
            .collect()
    }

    pub fn account(&self, kind: AccountKind, id: Uuid) -> Option<Account> {
        self.state.lock().unwrap().accounts(kind).get(&id).cloned()
    }

    pub fn file_request(&self, id: &str) -> Option<FileRequest> {
        self.state.lock().unwrap().file_requests.get(id).cloned()
    }

    pub fn download_logs(&self) -> Vec<DownloadLog> {
        self.state.lock().unwrap().download_logs.clone()
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.lock().unwrap().audit.clone()
    }

    /// Audit entries for one entity, oldest first
    pub fn audit_for(&self, entity_id: &str) -> Vec<AuditEntry> {
        self.audit_entries()
            .into_iter()
            .filter(|e| e.entity_id == entity_id)
            .collect()
    }

    pub fn fail_file(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_files
            .insert(id.to_string());
    }

    pub fn fail_account(&self, id: Uuid) {
        self.state.lock().unwrap().failing_accounts.insert(id);
    }

    /// Make listing soft-deleted accounts of `kind` fail
    pub fn fail_account_listing(&self, kind: AccountKind) {
        self.state.lock().unwrap().failing_listings.insert(kind);
    }

    /// Restore the file inside the next purge of it, just before the row
    /// delete, as a concurrent restore would
    pub fn restore_before_purge(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .restore_before_purge
            .insert(id.to_string());
    }

    pub fn heal(&self) {
        let mut state = self.state.lock().unwrap();
        state.failing_files.clear();
        state.failing_accounts.clear();
        state.failing_listings.clear();
        state.fail_audit = false;
    }

    pub fn fail_audit_writes(&self) {
        self.state.lock().unwrap().fail_audit = true;
    }
}

fn audit_matches(filter: &AuditFilter, entry: &AuditEntry) -> bool {
    filter
        .entity_type
        .is_none_or(|t| entry.entity_type == t.as_str())
        && filter
            .entity_id
            .as_deref()
            .is_none_or(|id| entry.entity_id == id)
        && filter.action.is_none_or(|a| entry.action == a.as_str())
}

fn page<T: Clone>(items: impl Iterator<Item = T>, limit: i64) -> Vec<T> {
    items.take(limit.max(0) as usize).collect()
}

#[async_trait]
impl RetentionStore for MemoryStore {
    async fn insert_file(&self, file: &NewFile) -> Result<File> {
        let row = File {
            id: file.id.clone(),
            owner_id: file.owner_id,
            file_name: file.file_name.clone(),
            size_bytes: file.size_bytes,
            content_hash: file.content_hash.clone(),
            uploaded_at: file.uploaded_at,
            expires_at: file.expires_at,
            unlimited_time: file.unlimited_time,
            downloads_remaining: file.downloads_remaining,
            unlimited_downloads: file.unlimited_downloads,
            download_count: 0,
            soft_deleted_at: None,
            soft_deleted_by: None,
        };
        let mut state = self.state.lock().unwrap();
        state.check_file(&file.id)?;
        if !state.users.contains_key(&file.owner_id) {
            return Err(AppError::BadRequest(format!(
                "Unknown owner {}",
                file.owner_id
            )));
        }
        state.files.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn get_file(&self, id: &str) -> Result<Option<File>> {
        let state = self.state.lock().unwrap();
        state.check_file(id)?;
        Ok(state.files.get(id).cloned())
    }

    async fn list_files_due_for_trash(
        &self,
        now: DateTime<Utc>,
        after: Option<&str>,
        limit: i64,
    ) -> Result<Vec<File>> {
        let state = self.state.lock().unwrap();
        Ok(page(
            state
                .files
                .values()
                .filter(|f| after.is_none_or(|a| f.id.as_str() > a))
                .filter(|f| f.state(now) == FileState::Expired)
                .cloned(),
            limit,
        ))
    }

    async fn list_trashed_files_before(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<&str>,
        limit: i64,
    ) -> Result<Vec<File>> {
        let state = self.state.lock().unwrap();
        Ok(page(
            state
                .files
                .values()
                .filter(|f| after.is_none_or(|a| f.id.as_str() > a))
                .filter(|f| f.trashed_before(cutoff))
                .cloned(),
            limit,
        ))
    }

    async fn list_files_by_owner(
        &self,
        owner_id: Uuid,
        after: Option<&str>,
        limit: i64,
    ) -> Result<Vec<File>> {
        let state = self.state.lock().unwrap();
        Ok(page(
            state
                .files
                .values()
                .filter(|f| after.is_none_or(|a| f.id.as_str() > a))
                .filter(|f| f.owner_id == owner_id)
                .cloned(),
            limit,
        ))
    }

    async fn mark_file_trashed(
        &self,
        id: &str,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut state = self.state.lock().unwrap();
        state.check_file(id)?;
        Ok(match state.files.get_mut(id) {
            None => TransitionOutcome::NotFound,
            Some(f) if f.soft_deleted_at.is_some() => TransitionOutcome::AlreadyApplied,
            Some(f) => {
                f.soft_deleted_at = Some(at);
                f.soft_deleted_by = Some(actor_id.to_string());
                TransitionOutcome::Applied
            }
        })
    }

    async fn clear_file_trash(&self, id: &str) -> Result<TransitionOutcome> {
        let mut state = self.state.lock().unwrap();
        state.check_file(id)?;
        Ok(match state.files.get_mut(id) {
            None => TransitionOutcome::NotFound,
            Some(f) if f.soft_deleted_at.is_none() => TransitionOutcome::AlreadyApplied,
            Some(f) => {
                f.soft_deleted_at = None;
                f.soft_deleted_by = None;
                TransitionOutcome::Applied
            }
        })
    }

    async fn record_download(
        &self,
        file_id: &str,
        download_account_id: Option<Uuid>,
        email: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut state = self.state.lock().unwrap();
        state.check_file(file_id)?;
        let Some(f) = state.files.get_mut(file_id) else {
            return Ok(TransitionOutcome::NotFound);
        };
        if !f.is_active(at) {
            return Ok(TransitionOutcome::NotEligible);
        }
        if !f.unlimited_downloads {
            f.downloads_remaining -= 1;
        }
        f.download_count += 1;

        state.next_log_id += 1;
        let log = DownloadLog {
            id: state.next_log_id,
            file_id: file_id.to_string(),
            download_account_id,
            email: email.map(str::to_string),
            downloaded_at: at,
        };
        state.download_logs.push(log);
        Ok(TransitionOutcome::Applied)
    }

    async fn purge_trashed_file(
        &self,
        id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut state = self.state.lock().unwrap();
        state.check_file(id)?;
        if state.restore_before_purge.remove(id) {
            if let Some(f) = state.files.get_mut(id) {
                f.soft_deleted_at = None;
                f.soft_deleted_by = None;
            }
        }
        let eligible = match state.files.get(id) {
            None => return Ok(TransitionOutcome::NotFound),
            Some(f) => f.trashed_before(cutoff),
        };
        if !eligible {
            return Ok(TransitionOutcome::NotEligible);
        }
        state.download_logs.retain(|l| l.file_id != id);
        state.files.remove(id);
        Ok(TransitionOutcome::Applied)
    }

    async fn purge_file(&self, id: &str) -> Result<TransitionOutcome> {
        let mut state = self.state.lock().unwrap();
        state.check_file(id)?;
        state.download_logs.retain(|l| l.file_id != id);
        Ok(match state.files.remove(id) {
            Some(_) => TransitionOutcome::Applied,
            None => TransitionOutcome::NotFound,
        })
    }

    async fn sum_untrashed_file_bytes(&self, owner_id: Uuid) -> Result<i64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .files
            .values()
            .filter(|f| f.owner_id == owner_id && f.soft_deleted_at.is_none())
            .map(|f| f.size_bytes)
            .sum())
    }

    async fn set_consumed_storage(
        &self,
        user_id: Uuid,
        megabytes: i64,
    ) -> Result<TransitionOutcome> {
        let mut state = self.state.lock().unwrap();
        Ok(match state.users.get_mut(&user_id) {
            Some(user) => {
                user.consumed_storage_mb = Some(megabytes);
                TransitionOutcome::Applied
            }
            None => TransitionOutcome::NotFound,
        })
    }

    async fn get_account(&self, kind: AccountKind, id: Uuid) -> Result<Option<Account>> {
        let mut state = self.state.lock().unwrap();
        state.check_account(id)?;
        Ok(state.accounts(kind).get(&id).cloned())
    }

    async fn mark_account_soft_deleted(
        &self,
        kind: AccountKind,
        id: Uuid,
        anonymized_email: &str,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut state = self.state.lock().unwrap();
        state.check_account(id)?;
        Ok(match state.accounts(kind).get_mut(&id) {
            None => TransitionOutcome::NotFound,
            Some(a) if a.soft_deleted_at.is_some() => TransitionOutcome::AlreadyApplied,
            Some(a) => {
                a.original_email = Some(std::mem::replace(
                    &mut a.email,
                    anonymized_email.to_string(),
                ));
                a.is_active = false;
                a.soft_deleted_at = Some(at);
                a.soft_deleted_by = Some(actor_id.to_string());
                TransitionOutcome::Applied
            }
        })
    }

    async fn anonymize_download_logs(
        &self,
        account_id: Uuid,
        anonymized_email: &str,
    ) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let mut changed = 0;
        for log in state
            .download_logs
            .iter_mut()
            .filter(|l| l.download_account_id == Some(account_id))
        {
            if log.email.as_deref() != Some(anonymized_email) {
                log.email = Some(anonymized_email.to_string());
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn list_accounts_soft_deleted_before(
        &self,
        kind: AccountKind,
        cutoff: DateTime<Utc>,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Account>> {
        let mut state = self.state.lock().unwrap();
        if state.failing_listings.contains(&kind) {
            return Err(AppError::Internal(format!(
                "injected listing failure for {}",
                kind
            )));
        }
        Ok(page(
            state
                .accounts(kind)
                .values()
                .filter(|a| after.is_none_or(|after| a.id > after))
                .filter(|a| a.soft_deleted_before(cutoff))
                .cloned(),
            limit,
        ))
    }

    async fn delete_download_logs_for_account(&self, account_id: Uuid) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.check_account(account_id)?;
        let before = state.download_logs.len();
        state
            .download_logs
            .retain(|l| l.download_account_id != Some(account_id));
        Ok((before - state.download_logs.len()) as u64)
    }

    async fn delete_file_requests_by_owner(&self, owner_id: Uuid) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.file_requests.len();
        state.file_requests.retain(|_, r| r.owner_id != owner_id);
        Ok((before - state.file_requests.len()) as u64)
    }

    async fn delete_soft_deleted_account(
        &self,
        kind: AccountKind,
        id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut state = self.state.lock().unwrap();
        state.check_account(id)?;
        let eligible = match state.accounts(kind).get(&id) {
            None => return Ok(TransitionOutcome::NotFound),
            Some(a) => a.soft_deleted_before(cutoff),
        };
        if !eligible {
            return Ok(TransitionOutcome::NotEligible);
        }

        let referenced = match kind {
            AccountKind::User => {
                state.files.values().any(|f| f.owner_id == id)
                    || state.file_requests.values().any(|r| r.owner_id == id)
            }
            AccountKind::DownloadAccount => state
                .download_logs
                .iter()
                .any(|l| l.download_account_id == Some(id)),
        };
        if referenced {
            return Err(AppError::Internal(format!(
                "{} {} is still referenced",
                kind, id
            )));
        }

        state.accounts(kind).remove(&id);
        Ok(TransitionOutcome::Applied)
    }

    async fn list_file_requests_expired_before(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<&str>,
        limit: i64,
    ) -> Result<Vec<FileRequest>> {
        let state = self.state.lock().unwrap();
        Ok(page(
            state
                .file_requests
                .values()
                .filter(|r| after.is_none_or(|a| r.id.as_str() > a))
                .filter(|r| r.expired_before(cutoff))
                .cloned(),
            limit,
        ))
    }

    async fn delete_expired_file_request(
        &self,
        id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut state = self.state.lock().unwrap();
        state.check_file(id)?;
        let eligible = match state.file_requests.get(id) {
            None => return Ok(TransitionOutcome::NotFound),
            Some(r) => r.expired_before(cutoff),
        };
        if !eligible {
            return Ok(TransitionOutcome::NotEligible);
        }
        state.file_requests.remove(id);
        Ok(TransitionOutcome::Applied)
    }

    async fn append_audit(
        &self,
        entry: &NewAuditEntry,
        at: DateTime<Utc>,
    ) -> Result<AuditEntry> {
        let mut state = self.state.lock().unwrap();
        if state.fail_audit {
            return Err(AppError::Internal("injected audit failure".to_string()));
        }
        let row = AuditEntry {
            id: Uuid::now_v7(),
            created_at: at,
            actor_id: entry.actor_id.clone(),
            actor_email: entry.actor_email.clone(),
            action: entry.action.as_str().to_string(),
            entity_type: entry.entity_type.as_str().to_string(),
            entity_id: entry.entity_id.clone(),
            success: entry.success,
            details: entry.details.clone(),
            entry_size: entry.approximate_size(),
        };
        state.audit.push(row.clone());
        Ok(row)
    }

    async fn list_audit(
        &self,
        filter: &AuditFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<AuditEntry>, i64)> {
        let state = self.state.lock().unwrap();
        let matching: Vec<AuditEntry> = state
            .audit
            .iter()
            .rev()
            .filter(|e| audit_matches(filter, e))
            .cloned()
            .collect();
        let total = matching.len() as i64;
        let items = page(matching.into_iter().skip(offset.max(0) as usize), limit);
        Ok((items, total))
    }

    async fn delete_audit_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.audit.len();
        state.audit.retain(|e| e.created_at >= cutoff);
        Ok((before - state.audit.len()) as u64)
    }

    async fn audit_total_size(&self) -> Result<i64> {
        let state = self.state.lock().unwrap();
        Ok(state.audit.iter().map(|e| e.entry_size).sum())
    }

    async fn oldest_audit_sizes(&self, limit: i64) -> Result<Vec<(Uuid, i64)>> {
        let state = self.state.lock().unwrap();
        let mut entries: Vec<&AuditEntry> = state.audit.iter().collect();
        entries.sort_by_key(|e| (e.created_at, e.id));
        Ok(page(
            entries.into_iter().map(|e| (e.id, e.entry_size)),
            limit,
        ))
    }

    async fn delete_audit_entries(&self, ids: &[Uuid]) -> Result<u64> {
        let ids: HashSet<&Uuid> = ids.iter().collect();
        let mut state = self.state.lock().unwrap();
        let before = state.audit.len();
        state.audit.retain(|e| !ids.contains(&e.id));
        Ok((before - state.audit.len()) as u64)
    }
}

// =============================================================================
// BLOB STORE
// =============================================================================

/// `BlobStore` holding bytes in a map; `fail` makes deletes of an id fail
/// with an I/O-style error
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().unwrap().is_empty()
    }

    pub fn fail(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_blob(&self, id: &str, data: &[u8]) -> Result<()> {
        self.blobs
            .lock()
            .unwrap()
            .insert(id.to_string(), data.to_vec());
        Ok(())
    }

    async fn read_blob(&self, id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().unwrap().get(id).cloned())
    }

    async fn delete_blob(&self, id: &str) -> Result<BlobDeleteOutcome> {
        if self.failing.lock().unwrap().contains(id) {
            return Err(AppError::Storage(format!("permission denied: {}", id)));
        }
        Ok(match self.blobs.lock().unwrap().remove(id) {
            Some(_) => BlobDeleteOutcome::Deleted,
            None => BlobDeleteOutcome::NotFound,
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// =============================================================================
// FIXTURES
// =============================================================================

/// A file uploaded at `now` with a one hour time limit and unlimited downloads
pub fn sample_file(id: &str, owner_id: Uuid, size_bytes: i64, now: DateTime<Utc>) -> File {
    File {
        id: id.to_string(),
        owner_id,
        file_name: format!("{}.bin", id),
        size_bytes,
        content_hash: format!("hash-{}", id),
        uploaded_at: now,
        expires_at: Some(now + Duration::hours(1)),
        unlimited_time: false,
        downloads_remaining: 0,
        unlimited_downloads: true,
        download_count: 0,
        soft_deleted_at: None,
        soft_deleted_by: None,
    }
}

/// Same as `sample_file` but never expiring
pub fn permanent_file(id: &str, owner_id: Uuid, size_bytes: i64, now: DateTime<Utc>) -> File {
    File {
        unlimited_time: true,
        expires_at: None,
        ..sample_file(id, owner_id, size_bytes, now)
    }
}

// =============================================================================
// SERVICE GRAPH
// =============================================================================

/// Every lifecycle service wired over the in-memory doubles
pub struct TestServices {
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub clock: Arc<ManualClock>,
    pub audit: Arc<AuditService>,
    pub quota: Arc<QuotaService>,
    pub files: Arc<FileLifecycleService>,
    pub accounts: Arc<AccountLifecycleService>,
    pub sweeps: Arc<SweepService>,
}

impl TestServices {
    pub fn new() -> Self {
        Self::with_retention(RetentionConfig::default())
    }

    pub fn with_retention(retention: RetentionConfig) -> Self {
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();
        let clock = Arc::new(ManualClock::default());
        let batch = retention.sweep_batch_size;

        let audit = Arc::new(AuditService::new(store.clone(), clock.clone()));
        let quota = Arc::new(QuotaService::new(store.clone(), audit.clone()));
        let files = Arc::new(FileLifecycleService::new(
            store.clone(),
            blobs.clone(),
            quota.clone(),
            audit.clone(),
            clock.clone(),
            batch,
        ));
        let accounts = Arc::new(AccountLifecycleService::new(
            store.clone(),
            files.clone(),
            audit.clone(),
            clock.clone(),
            batch,
        ));
        let file_requests = Arc::new(FileRequestService::new(
            store.clone(),
            audit.clone(),
            clock.clone(),
            batch,
        ));
        let sweeps = Arc::new(SweepService::new(
            files.clone(),
            accounts.clone(),
            file_requests,
            audit.clone(),
            retention,
        ));

        Self {
            store,
            blobs,
            clock,
            audit,
            quota,
            files,
            accounts,
            sweeps,
        }
    }
}

// =============================================================================
// HTTP
// =============================================================================

const TEST_ADMIN_CREDENTIALS: &str = "ops:secret";

/// Wrap admin routes in the basic-auth layer, accepting `ops:secret`
pub fn admin_server(router: axum::Router) -> axum_test::TestServer {
    let router = router.layer(axum::middleware::from_fn(
        crate::core::middleware::basic_auth_middleware(
            Arc::new(TEST_ADMIN_CREDENTIALS.to_string()),
            "Admin API",
        ),
    ));
    axum_test::TestServer::new(router).unwrap()
}

/// Authorization header matching `admin_server`
pub fn admin_auth() -> (axum::http::HeaderName, axum::http::HeaderValue) {
    use base64::prelude::*;

    let encoded = BASE64_STANDARD.encode(TEST_ADMIN_CREDENTIALS);
    (
        axum::http::header::AUTHORIZATION,
        axum::http::HeaderValue::from_str(&format!("Basic {}", encoded)).unwrap(),
    )
}
