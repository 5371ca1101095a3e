use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::audit::models::{
    AuditAction, AuditEntry, AuditFilter, EntityType, NewAuditEntry,
};
use crate::modules::retention_store::RetentionStore;
use crate::shared::clock::Clock;
use crate::shared::constants::BYTES_PER_MEGABYTE;
use crate::shared::lifecycle::{Actor, SweepReport, TransitionOutcome};
use crate::shared::types::PaginationQuery;

/// Entries fetched per round while trimming the log down to its size budget
const SIZE_PURGE_BATCH: i64 = 500;

/// Entity id used for audit entries that describe the audit log itself
const AUDIT_LOG_ENTITY_ID: &str = "audit_log";

/// Counts removed by one audit retention run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditPurgeReport {
    pub deleted_by_age: u64,
    pub deleted_by_size: u64,
}

/// Appends and trims the audit log
pub struct AuditService {
    store: Arc<dyn RetentionStore>,
    clock: Arc<dyn Clock>,
}

impl AuditService {
    pub fn new(store: Arc<dyn RetentionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Append an entry. A failed write is logged and swallowed: the
    /// transition it describes has already committed.
    pub async fn record(&self, entry: NewAuditEntry) {
        match self.store.append_audit(&entry, self.clock.now()).await {
            Ok(saved) => debug!(
                "Audit {} {} {} by {}",
                saved.action, saved.entity_type, saved.entity_id, saved.actor_id
            ),
            Err(e) => warn!(
                "Failed to write audit entry {} for {} {}: {:?}",
                entry.action, entry.entity_type, entry.entity_id, e
            ),
        }
    }

    /// Record the result of a transition: the outcome on success, the error
    /// text with `success = false` otherwise
    pub async fn record_result(&self, entry: NewAuditEntry, result: &Result<TransitionOutcome>) {
        let entry = match result {
            Ok(outcome) => entry.with_detail("outcome", outcome.as_str()),
            Err(e) => entry.success(false).with_detail("error", e.to_string()),
        };
        self.record(entry).await;
    }

    /// Entries matching `filter`, newest first, with the total match count
    pub async fn list(
        &self,
        filter: &AuditFilter,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<AuditEntry>, i64)> {
        self.store
            .list_audit(filter, pagination.offset(), pagination.limit())
            .await
    }

    /// Delete entries older than `retention_days`
    pub async fn purge_by_age(&self, retention_days: i64) -> Result<u64> {
        let cutoff = self.clock.now() - Duration::days(retention_days);
        let deleted = self.store.delete_audit_before(cutoff).await?;
        if deleted > 0 {
            info!("Purged {} audit entries older than {}", deleted, cutoff);
        }
        Ok(deleted)
    }

    /// Delete the oldest entries until the log fits in `max_size_mb`
    pub async fn purge_by_size(&self, max_size_mb: i64) -> Result<u64> {
        let budget = max_size_mb.saturating_mul(BYTES_PER_MEGABYTE);
        let mut deleted = 0;

        loop {
            let total = self.store.audit_total_size().await?;
            if total <= budget {
                break;
            }

            let oldest = self.store.oldest_audit_sizes(SIZE_PURGE_BATCH).await?;
            if oldest.is_empty() {
                break;
            }

            let mut excess = total - budget;
            let mut victims: Vec<Uuid> = Vec::new();
            for (id, size) in oldest {
                if excess <= 0 {
                    break;
                }
                victims.push(id);
                excess -= size.max(1);
            }

            let removed = self.store.delete_audit_entries(&victims).await?;
            if removed == 0 {
                break;
            }
            deleted += removed;
        }

        if deleted > 0 {
            info!(
                "Purged {} audit entries to stay under {} MB",
                deleted, max_size_mb
            );
        }
        Ok(deleted)
    }

    /// Age then size purge, recorded as one `AUDIT_PURGED` entry
    pub async fn purge(&self, retention_days: i64, max_size_mb: i64) -> Result<SweepReport> {
        let result = self.run_purge(retention_days, max_size_mb).await;

        let entry = NewAuditEntry::new(
            AuditAction::AuditPurged,
            EntityType::AuditLog,
            AUDIT_LOG_ENTITY_ID,
            &Actor::System,
        )
        .with_detail("retention_days", retention_days)
        .with_detail("max_size_mb", max_size_mb);

        match result {
            Ok(report) => {
                self.record(
                    entry
                        .with_detail("deleted_by_age", report.deleted_by_age)
                        .with_detail("deleted_by_size", report.deleted_by_size),
                )
                .await;
                let deleted = report.deleted_by_age + report.deleted_by_size;
                Ok(SweepReport {
                    examined: deleted,
                    applied: deleted,
                    ..SweepReport::default()
                })
            }
            Err(e) => {
                self.record(entry.success(false).with_detail("error", e.to_string()))
                    .await;
                Err(e)
            }
        }
    }

    async fn run_purge(&self, retention_days: i64, max_size_mb: i64) -> Result<AuditPurgeReport> {
        let deleted_by_age = self.purge_by_age(retention_days).await?;
        let deleted_by_size = self.purge_by_size(max_size_mb).await?;
        Ok(AuditPurgeReport {
            deleted_by_age,
            deleted_by_size,
        })
    }
}
