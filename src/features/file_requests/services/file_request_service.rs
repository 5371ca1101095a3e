use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::core::error::Result;
use crate::features::audit::models::{AuditAction, EntityType, NewAuditEntry};
use crate::features::audit::services::AuditService;
use crate::modules::retention_store::RetentionStore;
use crate::shared::clock::Clock;
use crate::shared::lifecycle::{Actor, SweepReport, TransitionOutcome};

/// Removes upload-request tokens once their deadline plus grace has passed
pub struct FileRequestService {
    store: Arc<dyn RetentionStore>,
    audit: Arc<AuditService>,
    clock: Arc<dyn Clock>,
    batch_size: i64,
}

impl FileRequestService {
    pub fn new(
        store: Arc<dyn RetentionStore>,
        audit: Arc<AuditService>,
        clock: Arc<dyn Clock>,
        batch_size: i64,
    ) -> Self {
        Self {
            store,
            audit,
            clock,
            batch_size,
        }
    }

    /// Delete every request whose deadline passed more than `grace_days` ago
    pub async fn purge_expired(&self, grace_days: i64) -> Result<SweepReport> {
        let cutoff = self.clock.now() - Duration::days(grace_days);
        let mut report = SweepReport::default();
        let mut after: Option<String> = None;

        loop {
            let batch = self
                .store
                .list_file_requests_expired_before(cutoff, after.as_deref(), self.batch_size)
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            after = Some(last.id.clone());
            let exhausted = (batch.len() as i64) < self.batch_size;

            for request in batch.iter().filter(|r| r.expired_before(cutoff)) {
                let result = self
                    .store
                    .delete_expired_file_request(&request.id, cutoff)
                    .await;
                match &result {
                    Ok(TransitionOutcome::Applied) => info!(
                        "Purged file request {} (deadline {:?})",
                        request.id, request.deadline
                    ),
                    Ok(outcome) => {
                        debug!("Purge of file request {} skipped: {}", request.id, outcome)
                    }
                    Err(e) => error!("Failed to purge file request {}: {:?}", request.id, e),
                }

                self.audit
                    .record_result(
                        NewAuditEntry::new(
                            AuditAction::FileRequestPurged,
                            EntityType::FileRequest,
                            &request.id,
                            &Actor::System,
                        )
                        .with_detail("owner_id", request.owner_id),
                        &result,
                    )
                    .await;

                match result {
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
}
