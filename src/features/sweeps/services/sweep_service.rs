use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::core::config::RetentionConfig;
use crate::core::error::Result;
use crate::features::accounts::services::AccountLifecycleService;
use crate::features::audit::services::AuditService;
use crate::features::file_requests::services::FileRequestService;
use crate::features::files::services::FileLifecycleService;
use crate::features::sweeps::models::SweepKind;
use crate::shared::lifecycle::SweepReport;

/// Runs a single sweep with the configured windows. Used both by the
/// scheduler and by the on-demand admin endpoint.
pub struct SweepService {
    files: Arc<FileLifecycleService>,
    accounts: Arc<AccountLifecycleService>,
    file_requests: Arc<FileRequestService>,
    audit: Arc<AuditService>,
    retention: RetentionConfig,
}

impl SweepService {
    pub fn new(
        files: Arc<FileLifecycleService>,
        accounts: Arc<AccountLifecycleService>,
        file_requests: Arc<FileRequestService>,
        audit: Arc<AuditService>,
        retention: RetentionConfig,
    ) -> Self {
        Self {
            files,
            accounts,
            file_requests,
            audit,
            retention,
        }
    }

    pub async fn run(&self, kind: SweepKind) -> Result<SweepReport> {
        let started = Instant::now();

        let result = match kind {
            SweepKind::Expiration => self.files.trash_due_files().await,
            SweepKind::TrashPurge => {
                self.files
                    .purge_old_trash(self.retention.trash_retention_days)
                    .await
            }
            SweepKind::FileRequestPurge => {
                self.file_requests
                    .purge_expired(self.retention.file_request_grace_days)
                    .await
            }
            SweepKind::AccountPurge => {
                self.accounts
                    .purge_old_accounts(self.retention.account_purge_days)
                    .await
            }
            SweepKind::AuditPurge => {
                self.audit
                    .purge(
                        self.retention.audit_retention_days,
                        self.retention.audit_max_size_mb,
                    )
                    .await
            }
        };

        match &result {
            Ok(report) => info!(
                "Sweep {} finished in {:?}: {}",
                kind,
                started.elapsed(),
                report
            ),
            Err(e) => error!("Sweep {} aborted: {:?}", kind, e),
        }

        result
    }
}
