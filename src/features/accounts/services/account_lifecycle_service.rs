use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::accounts::models::{anonymize_email, Account, AccountKind, CleanupStep};
use crate::features::audit::models::{AuditAction, NewAuditEntry};
use crate::features::audit::services::AuditService;
use crate::features::files::services::FileLifecycleService;
use crate::modules::retention_store::RetentionStore;
use crate::shared::clock::Clock;
use crate::shared::lifecycle::{Actor, SweepReport, TransitionOutcome};

fn soft_deleted_action(kind: AccountKind) -> AuditAction {
    match kind {
        AccountKind::User => AuditAction::UserSoftDeleted,
        AccountKind::DownloadAccount => AuditAction::DownloadAccountSoftDeleted,
    }
}

fn step_failed(step: CleanupStep, kind: AccountKind, id: Uuid, e: &AppError) {
    error!("Cleanup step {} failed for {} {}: {:?}", step, kind, id, e);
}

fn purged_action(kind: AccountKind) -> AuditAction {
    match kind {
        AccountKind::User => AuditAction::UserPurged,
        AccountKind::DownloadAccount => AuditAction::DownloadAccountPurged,
    }
}

/// Soft-delete (anonymize) and purge of users and download accounts
pub struct AccountLifecycleService {
    store: Arc<dyn RetentionStore>,
    files: Arc<FileLifecycleService>,
    audit: Arc<AuditService>,
    clock: Arc<dyn Clock>,
    batch_size: i64,
}

impl AccountLifecycleService {
    pub fn new(
        store: Arc<dyn RetentionStore>,
        files: Arc<FileLifecycleService>,
        audit: Arc<AuditService>,
        clock: Arc<dyn Clock>,
        batch_size: i64,
    ) -> Self {
        Self {
            store,
            files,
            audit,
            clock,
            batch_size,
        }
    }

    /// Anonymize and deactivate a user, then trash every file of theirs
    /// that is still active. The cascade runs again on a repeated call so
    /// files that failed to trash the first time get another chance.
    pub async fn soft_delete_user(&self, id: Uuid, actor: &Actor) -> Result<TransitionOutcome> {
        let kind = AccountKind::User;
        let result = self.mark_soft_deleted(kind, id, actor).await;
        let mut entry = NewAuditEntry::new(
            soft_deleted_action(kind),
            kind.entity_type(),
            id.to_string(),
            actor,
        );

        if let Ok((TransitionOutcome::Applied | TransitionOutcome::AlreadyApplied, _)) = &result {
            match self.trash_owned_files(id, actor).await {
                Ok(cascade) => {
                    if cascade.applied > 0 || cascade.failed > 0 {
                        info!(
                            "Soft-delete of user {} trashed {} files ({} failed)",
                            id, cascade.applied, cascade.failed
                        );
                    }
                    entry = entry
                        .with_detail("files_trashed", cascade.applied)
                        .with_detail("files_failed", cascade.failed);
                }
                Err(e) => {
                    error!(
                        "Failed to cascade soft-delete of user {} to files: {:?}",
                        id, e
                    );
                    entry = entry.with_detail("cascade_error", e.to_string());
                }
            }
        }

        let result = result.map(|(outcome, _)| outcome);
        self.audit.record_result(entry, &result).await;
        result
    }

    /// Anonymize and deactivate a download account, then anonymize the
    /// email on its download history. Files shared with the account are
    /// left untouched.
    pub async fn soft_delete_download_account(
        &self,
        id: Uuid,
        actor: &Actor,
    ) -> Result<TransitionOutcome> {
        let kind = AccountKind::DownloadAccount;
        let result = self.mark_soft_deleted(kind, id, actor).await;
        let mut entry = NewAuditEntry::new(
            soft_deleted_action(kind),
            kind.entity_type(),
            id.to_string(),
            actor,
        );

        if let Ok((
            TransitionOutcome::Applied | TransitionOutcome::AlreadyApplied,
            Some(anonymized),
        )) = &result
        {
            match self.store.anonymize_download_logs(id, anonymized).await {
                Ok(rows) => {
                    debug!("Anonymized {} download logs of account {}", rows, id);
                    entry = entry.with_detail("logs_anonymized", rows);
                }
                Err(e) => {
                    error!(
                        "Failed to anonymize download logs of account {}: {:?}",
                        id, e
                    );
                    entry = entry.with_detail("cascade_error", e.to_string());
                }
            }
        }

        let result = result.map(|(outcome, _)| outcome);
        self.audit.record_result(entry, &result).await;
        result
    }

    /// Account-purge sweep: hard-delete users and download accounts
    /// soft-deleted at least `age_days` ago. Each kind runs even when the
    /// other fails; the sweep errors only when both do.
    pub async fn purge_old_accounts(&self, age_days: i64) -> Result<SweepReport> {
        let cutoff = self.clock.now() - Duration::days(age_days);
        let mut report = SweepReport::default();
        let mut last_error = None;
        let mut any_ran = false;

        for kind in [AccountKind::User, AccountKind::DownloadAccount] {
            match self.purge_kind(kind, cutoff).await {
                Ok(kind_report) => {
                    report = report.merge(kind_report);
                    any_ran = true;
                }
                Err(e) => {
                    error!("Purge of soft-deleted {} accounts stopped: {:?}", kind, e);
                    report.record_failure();
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_ran => Err(e),
            _ => Ok(report),
        }
    }

    /// Returns the outcome and, when the account exists, its anonymized
    /// address
    async fn mark_soft_deleted(
        &self,
        kind: AccountKind,
        id: Uuid,
        actor: &Actor,
    ) -> Result<(TransitionOutcome, Option<String>)> {
        let account = match self.store.get_account(kind, id).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                debug!("Soft-delete of {} {} skipped: not found", kind, id);
                return Ok((TransitionOutcome::NotFound, None));
            }
            Err(e) => {
                error!("Failed to load {} {}: {:?}", kind, id, e);
                return Err(e);
            }
        };

        let anonymized = anonymize_email(&account.email, id);
        let outcome = self
            .store
            .mark_account_soft_deleted(kind, id, &anonymized, &actor.id(), self.clock.now())
            .await
            .inspect_err(|e| error!("Failed to soft-delete {} {}: {:?}", kind, id, e))?;

        match outcome {
            TransitionOutcome::Applied => info!("Soft-deleted {} {} (actor: {})", kind, id, actor),
            other => debug!("Soft-delete of {} {} skipped: {}", kind, id, other),
        }

        Ok((outcome, Some(anonymized)))
    }

    async fn trash_owned_files(&self, owner_id: Uuid, actor: &Actor) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let mut after: Option<String> = None;

        loop {
            let batch = self
                .store
                .list_files_by_owner(owner_id, after.as_deref(), self.batch_size)
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            after = Some(last.id.clone());
            let exhausted = (batch.len() as i64) < self.batch_size;

            let now = self.clock.now();
            for file in batch.iter().filter(|f| f.is_active(now)) {
                match self.files.trash_file(&file.id, actor).await {
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

    async fn purge_kind(&self, kind: AccountKind, cutoff: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let mut after: Option<Uuid> = None;

        loop {
            let batch = self
                .store
                .list_accounts_soft_deleted_before(kind, cutoff, after, self.batch_size)
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            after = Some(last.id);
            let exhausted = (batch.len() as i64) < self.batch_size;

            for account in &batch {
                match self.purge_account(kind, account, cutoff).await {
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

    async fn purge_account(
        &self,
        kind: AccountKind,
        account: &Account,
        cutoff: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let entry = NewAuditEntry::new(
            purged_action(kind),
            kind.entity_type(),
            account.id.to_string(),
            &Actor::System,
        );

        if !account.soft_deleted_before(cutoff) {
            let result = Ok(TransitionOutcome::NotEligible);
            self.audit.record_result(entry, &result).await;
            return result;
        }

        let result = self.run_plan(kind, account.id, cutoff).await;
        match &result {
            Ok(TransitionOutcome::Applied) => info!("Purged {} {}", kind, account.id),
            Ok(outcome) => debug!("Purge of {} {} skipped: {}", kind, account.id, outcome),
            Err(e) => error!("Failed to purge {} {}: {:?}", kind, account.id, e),
        }

        self.audit.record_result(entry, &result).await;
        result
    }

    async fn run_plan(
        &self,
        kind: AccountKind,
        id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        for &step in CleanupStep::plan(kind) {
            if step == CleanupStep::DeleteAccountRow {
                return self
                    .store
                    .delete_soft_deleted_account(kind, id, cutoff)
                    .await
                    .inspect_err(|e| step_failed(step, kind, id, e));
            }

            let removed = self
                .run_step(step, id)
                .await
                .inspect_err(|e| step_failed(step, kind, id, e))?;
            debug!(
                "Cleanup step {} for {} {}: {} removed",
                step, kind, id, removed
            );
        }

        Err(AppError::Internal(format!(
            "Cleanup plan for {} never deletes the account row",
            kind
        )))
    }

    async fn run_step(&self, step: CleanupStep, id: Uuid) -> Result<u64> {
        match step {
            CleanupStep::PurgeOwnedFiles => self.purge_owned_files(id).await,
            CleanupStep::DeleteOwnedFileRequests => {
                self.store.delete_file_requests_by_owner(id).await
            }
            CleanupStep::DeleteDownloadLogs => {
                self.store.delete_download_logs_for_account(id).await
            }
            CleanupStep::DeleteAccountRow => Ok(0),
        }
    }

    async fn purge_owned_files(&self, owner_id: Uuid) -> Result<u64> {
        let mut purged = 0;
        let mut after: Option<String> = None;

        loop {
            let batch = self
                .store
                .list_files_by_owner(owner_id, after.as_deref(), self.batch_size)
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            after = Some(last.id.clone());
            let exhausted = (batch.len() as i64) < self.batch_size;

            for file in &batch {
                if self
                    .files
                    .purge_owned_file(file, &Actor::System)
                    .await?
                    .is_applied()
                {
                    purged += 1;
                }
            }

            if exhausted {
                break;
            }
        }

        Ok(purged)
    }
}
