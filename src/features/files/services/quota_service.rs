use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::audit::models::{AuditAction, EntityType, NewAuditEntry};
use crate::features::audit::services::AuditService;
use crate::modules::retention_store::RetentionStore;
use crate::shared::constants::BYTES_PER_MEGABYTE;
use crate::shared::lifecycle::{Actor, TransitionOutcome};

/// Keeps `users.consumed_storage_mb` in line with the file table.
///
/// The stored value is a cache: it is always rebuilt from scratch from the
/// owner's non-trashed files, so a missed recompute heals on the next one.
pub struct QuotaService {
    store: Arc<dyn RetentionStore>,
    audit: Arc<AuditService>,
}

impl QuotaService {
    pub fn new(store: Arc<dyn RetentionStore>, audit: Arc<AuditService>) -> Self {
        Self { store, audit }
    }

    /// Recompute and store the user's consumed storage in whole megabytes
    pub async fn recompute(&self, user_id: Uuid) -> Result<i64> {
        let bytes = self.store.sum_untrashed_file_bytes(user_id).await?;
        let megabytes = bytes / BYTES_PER_MEGABYTE;

        match self.store.set_consumed_storage(user_id, megabytes).await? {
            TransitionOutcome::NotFound => {
                Err(AppError::NotFound(format!("User {} not found", user_id)))
            }
            _ => {
                debug!(
                    "Quota for user {}: {} bytes -> {} MB",
                    user_id, bytes, megabytes
                );
                Ok(megabytes)
            }
        }
    }

    /// Operator-triggered recompute, recorded as `QUOTA_RECOMPUTED`
    pub async fn recompute_audited(&self, user_id: Uuid, actor: &Actor) -> Result<i64> {
        let result = self.recompute(user_id).await;

        let entry = NewAuditEntry::new(
            AuditAction::QuotaRecomputed,
            EntityType::User,
            user_id.to_string(),
            actor,
        );
        match &result {
            Ok(megabytes) => {
                info!("Recomputed quota for user {}: {} MB", user_id, megabytes);
                self.audit
                    .record(entry.with_detail("consumed_storage_mb", megabytes))
                    .await;
            }
            Err(e) => {
                self.audit
                    .record(entry.success(false).with_detail("error", e.to_string()))
                    .await;
            }
        }

        result
    }
}
