use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::accounts::models::AccountKind;
use crate::features::audit::models::{AuditAction, EntityType, NewAuditEntry};
use crate::features::audit::services::AuditService;
use crate::features::files::models::{File, FileContent, FileLimits, FileState, NewFile};
use crate::features::files::services::QuotaService;
use crate::modules::retention_store::RetentionStore;
use crate::modules::storage::{BlobDeleteOutcome, BlobStore};
use crate::shared::clock::Clock;
use crate::shared::lifecycle::{Actor, SweepReport, TransitionOutcome};

/// What happened to the bytes of a purged file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlobCleanup {
    Deleted,
    AlreadyAbsent,
    /// Left behind as an orphan; the row is purged regardless
    Failed,
}

impl BlobCleanup {
    fn as_str(self) -> &'static str {
        match self {
            BlobCleanup::Deleted => "deleted",
            BlobCleanup::AlreadyAbsent => "already_absent",
            BlobCleanup::Failed => "orphaned",
        }
    }
}

/// Which guard protects the row delete of a purge
#[derive(Debug, Clone, Copy)]
enum PurgeGuard {
    /// Trash purge: the row must still be trashed at or before the cutoff
    TrashedBefore(DateTime<Utc>),
    /// Owner removal: the row goes regardless of state, quota is skipped
    OwnerRemoval,
}

/// Entry points for every file transition: upload, download, trash,
/// restore and purge. Sweeps and explicit actions share these paths.
pub struct FileLifecycleService {
    store: Arc<dyn RetentionStore>,
    blobs: Arc<dyn BlobStore>,
    quota: Arc<QuotaService>,
    audit: Arc<AuditService>,
    clock: Arc<dyn Clock>,
    batch_size: i64,
}

impl FileLifecycleService {
    pub fn new(
        store: Arc<dyn RetentionStore>,
        blobs: Arc<dyn BlobStore>,
        quota: Arc<QuotaService>,
        audit: Arc<AuditService>,
        clock: Arc<dyn Clock>,
        batch_size: i64,
    ) -> Self {
        Self {
            store,
            blobs,
            quota,
            audit,
            clock,
            batch_size,
        }
    }

    /// Limits for an upload made now; `None` lifts the corresponding limit
    pub fn limits_from_now(
        &self,
        expires_in: Option<Duration>,
        max_downloads: Option<i32>,
    ) -> FileLimits {
        FileLimits {
            expires_at: expires_in.map(|d| self.clock.now() + d),
            unlimited_time: expires_in.is_none(),
            downloads_remaining: max_downloads.unwrap_or(0),
            unlimited_downloads: max_downloads.is_none(),
        }
    }

    pub fn state_of(&self, file: &File) -> FileState {
        file.state(self.clock.now())
    }

    /// Store the bytes, register the row and charge the owner's quota
    pub async fn register_upload(
        &self,
        owner_id: Uuid,
        file_name: &str,
        data: &[u8],
        limits: FileLimits,
        actor: &Actor,
    ) -> Result<File> {
        let id = Uuid::new_v4().simple().to_string();
        let content_hash = hex::encode(Sha256::digest(data));

        self.blobs.put_blob(&id, data).await?;

        let new_file = NewFile {
            id: id.clone(),
            owner_id,
            file_name: file_name.to_string(),
            size_bytes: data.len() as i64,
            content_hash,
            uploaded_at: self.clock.now(),
            expires_at: limits.expires_at,
            unlimited_time: limits.unlimited_time,
            downloads_remaining: limits.downloads_remaining,
            unlimited_downloads: limits.unlimited_downloads,
        };

        let file = match self.store.insert_file(&new_file).await {
            Ok(file) => file,
            Err(e) => {
                if let Err(cleanup) = self.blobs.delete_blob(&id).await {
                    warn!(
                        "Failed to remove blob of rejected upload {}: {:?}",
                        id, cleanup
                    );
                }
                return Err(e);
            }
        };

        info!(
            "Registered upload {} ({} bytes) for user {}",
            file.id, file.size_bytes, owner_id
        );

        self.refresh_quota(owner_id).await;
        self.audit
            .record(
                NewAuditEntry::new(AuditAction::FileUploaded, EntityType::File, &file.id, actor)
                    .with_detail("size_bytes", file.size_bytes)
                    .with_detail("content_hash", &file.content_hash),
            )
            .await;

        Ok(file)
    }

    /// Serve an active file's bytes and consume one download. The log row
    /// carries the download account's current email, if one is given.
    pub async fn download_file(
        &self,
        file_id: &str,
        download_account_id: Option<Uuid>,
    ) -> Result<FileContent> {
        let file = self
            .store
            .get_file(file_id)
            .await?
            .filter(|f| f.is_active(self.clock.now()))
            .ok_or_else(|| AppError::NotFound(format!("File {} is not available", file_id)))?;

        let email = match download_account_id {
            Some(account_id) => {
                let account = self
                    .store
                    .get_account(AccountKind::DownloadAccount, account_id)
                    .await?
                    .filter(|a| a.is_active)
                    .ok_or_else(|| {
                        AppError::BadRequest(format!("Unknown download account {}", account_id))
                    })?;
                Some(account.email)
            }
            None => None,
        };

        let data = self.blobs.read_blob(file_id).await?.ok_or_else(|| {
            AppError::Storage(format!(
                "Blob of file {} missing from {}",
                file_id,
                self.blobs.backend_name()
            ))
        })?;

        match self
            .record_download(file_id, download_account_id, email.as_deref())
            .await?
        {
            TransitionOutcome::Applied => Ok(FileContent {
                file_name: file.file_name,
                data,
            }),
            _ => Err(AppError::NotFound(format!(
                "File {} is not available",
                file_id
            ))),
        }
    }

    /// Consume one download of an active file
    pub async fn record_download(
        &self,
        file_id: &str,
        download_account_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<TransitionOutcome> {
        let outcome = self
            .store
            .record_download(file_id, download_account_id, email, self.clock.now())
            .await?;
        debug!("Download of file {}: {}", file_id, outcome);
        Ok(outcome)
    }

    /// Move a file to the trash. Re-trashing is a no-op.
    pub async fn trash_file(&self, id: &str, actor: &Actor) -> Result<TransitionOutcome> {
        let result = self
            .store
            .mark_file_trashed(id, &actor.id(), self.clock.now())
            .await;

        match &result {
            Ok(TransitionOutcome::Applied) => {
                info!("Trashed file {} (actor: {})", id, actor);
                self.refresh_quota_for(id).await;
            }
            Ok(outcome) => debug!("Trash of file {} skipped: {}", id, outcome),
            Err(e) => error!("Failed to trash file {}: {:?}", id, e),
        }

        self.audit
            .record_result(
                NewAuditEntry::new(AuditAction::FileTrashed, EntityType::File, id, actor),
                &result,
            )
            .await;
        result
    }

    /// Bring a trashed file back. Restoring an untrashed file is a no-op.
    pub async fn restore_file(&self, id: &str, actor: &Actor) -> Result<TransitionOutcome> {
        let result = self.store.clear_file_trash(id).await;

        match &result {
            Ok(TransitionOutcome::Applied) => {
                info!("Restored file {} (actor: {})", id, actor);
                self.refresh_quota_for(id).await;
            }
            Ok(outcome) => debug!("Restore of file {} skipped: {}", id, outcome),
            Err(e) => error!("Failed to restore file {}: {:?}", id, e),
        }

        self.audit
            .record_result(
                NewAuditEntry::new(AuditAction::FileRestored, EntityType::File, id, actor),
                &result,
            )
            .await;
        result
    }

    /// Permanently remove a file that has been in the trash for at least
    /// `retention`
    pub async fn purge_file(
        &self,
        id: &str,
        retention: Duration,
        actor: &Actor,
    ) -> Result<TransitionOutcome> {
        let cutoff = self.clock.now() - retention;
        let file = match self.store.get_file(id).await {
            Ok(Some(file)) => file,
            Ok(None) => {
                let result = Ok(TransitionOutcome::NotFound);
                self.audit
                    .record_result(
                        NewAuditEntry::new(AuditAction::FilePurged, EntityType::File, id, actor),
                        &result,
                    )
                    .await;
                return result;
            }
            Err(e) => {
                error!("Failed to load file {} for purge: {:?}", id, e);
                let result = Err(e);
                self.audit
                    .record_result(
                        NewAuditEntry::new(AuditAction::FilePurged, EntityType::File, id, actor),
                        &result,
                    )
                    .await;
                return result;
            }
        };

        self.purge(&file, PurgeGuard::TrashedBefore(cutoff), actor).await
    }

    /// Purge a file as part of removing its owner. No quota recompute: the
    /// owner row is about to go.
    pub async fn purge_owned_file(&self, file: &File, actor: &Actor) -> Result<TransitionOutcome> {
        self.purge(file, PurgeGuard::OwnerRemoval, actor).await
    }

    /// Expiration sweep: trash every untrashed file past its time or
    /// download limit
    pub async fn trash_due_files(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let mut report = SweepReport::default();
        let mut after: Option<String> = None;

        loop {
            let batch = self
                .store
                .list_files_due_for_trash(now, after.as_deref(), self.batch_size)
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            after = Some(last.id.clone());
            let exhausted = (batch.len() as i64) < self.batch_size;

            for file in &batch {
                match self.trash_file(&file.id, &Actor::System).await {
                    Ok(outcome) => report.record(outcome),
                    Err(_) => report.record_failure(),
                }
            }

            if exhausted {
                break;
            }
        }

        Ok(report)
    }

    /// Trash-purge sweep: purge every file trashed at least
    /// `retention_days` ago
    pub async fn purge_old_trash(&self, retention_days: i64) -> Result<SweepReport> {
        let retention = Duration::days(retention_days);
        let cutoff = self.clock.now() - retention;
        let mut report = SweepReport::default();
        let mut after: Option<String> = None;

        loop {
            let batch = self
                .store
                .list_trashed_files_before(cutoff, after.as_deref(), self.batch_size)
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            after = Some(last.id.clone());
            let exhausted = (batch.len() as i64) < self.batch_size;

            for file in &batch {
                match self
                    .purge(file, PurgeGuard::TrashedBefore(cutoff), &Actor::System)
                    .await
                {
                    Ok(outcome) => report.record(outcome),
                    Err(_) => report.record_failure(),
                }
            }

            if exhausted {
                break;
            }
        }

        Ok(report)
    }

    /// The row delete (with its download logs, in one transaction) is the
    /// commit point. The blob goes only once the row is gone; a blob that
    /// cannot be deleted stays behind as an orphan.
    async fn purge(
        &self,
        file: &File,
        guard: PurgeGuard,
        actor: &Actor,
    ) -> Result<TransitionOutcome> {
        if let PurgeGuard::TrashedBefore(cutoff) = guard {
            if !file.trashed_before(cutoff) {
                let result = Ok(TransitionOutcome::NotEligible);
                debug!("File {} is not due for purge", file.id);
                self.audit
                    .record_result(self.purge_entry(file, actor), &result)
                    .await;
                return result;
            }
        }

        let result = match guard {
            PurgeGuard::TrashedBefore(cutoff) => {
                self.store.purge_trashed_file(&file.id, cutoff).await
            }
            PurgeGuard::OwnerRemoval => self.store.purge_file(&file.id).await,
        };

        let mut entry = self.purge_entry(file, actor);
        match &result {
            Ok(TransitionOutcome::Applied) => {
                let blob = self.delete_blob(&file.id).await;
                info!(
                    "Purged file {} ({} bytes, blob {})",
                    file.id,
                    file.size_bytes,
                    blob.as_str()
                );
                if let PurgeGuard::TrashedBefore(_) = guard {
                    self.refresh_quota(file.owner_id).await;
                }
                entry = entry.with_detail("blob", blob.as_str());
            }
            Ok(outcome) => debug!("Purge of file {} skipped: {}", file.id, outcome),
            Err(e) => error!("Failed to purge file {}: {:?}", file.id, e),
        }

        self.audit.record_result(entry, &result).await;
        result
    }

    async fn delete_blob(&self, id: &str) -> BlobCleanup {
        match self.blobs.delete_blob(id).await {
            Ok(BlobDeleteOutcome::Deleted) => BlobCleanup::Deleted,
            Ok(BlobDeleteOutcome::NotFound) => {
                debug!("Blob of file {} already absent", id);
                BlobCleanup::AlreadyAbsent
            }
            Err(e) => {
                warn!(
                    "Failed to delete blob of file {} from {}, leaving it orphaned: {:?}",
                    id,
                    self.blobs.backend_name(),
                    e
                );
                BlobCleanup::Failed
            }
        }
    }

    fn purge_entry(&self, file: &File, actor: &Actor) -> NewAuditEntry {
        NewAuditEntry::new(AuditAction::FilePurged, EntityType::File, &file.id, actor)
            .with_detail("owner_id", file.owner_id)
            .with_detail("size_bytes", file.size_bytes)
    }

    async fn refresh_quota_for(&self, file_id: &str) {
        match self.store.get_file(file_id).await {
            Ok(Some(file)) => self.refresh_quota(file.owner_id).await,
            Ok(None) => debug!("File {} vanished before quota refresh", file_id),
            Err(e) => warn!("Failed to load file {} for quota refresh: {:?}", file_id, e),
        }
    }

    /// Quota failures never fail the transition that triggered them
    async fn refresh_quota(&self, owner_id: Uuid) {
        match self.quota.recompute(owner_id).await {
            Ok(_) => {}
            Err(AppError::NotFound(_)) => debug!("Owner {} no longer exists", owner_id),
            Err(e) => warn!("Failed to recompute quota for user {}: {:?}", owner_id, e),
        }
    }
}
