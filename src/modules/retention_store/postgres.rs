use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::RetentionStore;
use crate::core::error::{AppError, Result};
use crate::features::accounts::models::{Account, AccountKind};
use crate::features::audit::models::{AuditEntry, AuditFilter, NewAuditEntry};
use crate::features::file_requests::models::FileRequest;
use crate::features::files::models::{File, NewFile};
use crate::shared::lifecycle::TransitionOutcome;

const FILE_COLUMNS: &str = r#"
    id, owner_id, file_name, size_bytes, content_hash, uploaded_at,
    expires_at, unlimited_time, downloads_remaining, unlimited_downloads,
    download_count, soft_deleted_at, soft_deleted_by
"#;

const AUDIT_COLUMNS: &str = r#"
    id, created_at, actor_id, actor_email, action, entity_type, entity_id,
    success, details, entry_size
"#;

/// Log a failed statement and wrap it as a database error
fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        tracing::error!("Failed to {}: {:?}", context, e);
        AppError::Database(e)
    }
}

fn account_columns(kind: AccountKind) -> &'static str {
    match kind {
        AccountKind::User => {
            "id, email, original_email, is_active, consumed_storage_mb, soft_deleted_at, soft_deleted_by"
        }
        AccountKind::DownloadAccount => {
            "id, email, original_email, is_active, NULL::BIGINT AS consumed_storage_mb, soft_deleted_at, soft_deleted_by"
        }
    }
}

/// PostgreSQL implementation of the retention store
pub struct PgRetentionStore {
    pool: PgPool,
}

impl PgRetentionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn file_exists(&self, id: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM files WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("look up file"))
    }

    async fn account_exists(&self, kind: AccountKind, id: Uuid) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)",
            kind.table()
        );
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("look up account"))
    }

    /// Download logs first, then the file row they reference. Returns
    /// whether the file row existed.
    async fn delete_file_rows(tx: &mut Transaction<'_, Postgres>, id: &str) -> Result<bool> {
        let logs = sqlx::query("DELETE FROM download_logs WHERE file_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(db_error("delete download logs for file"))?;
        if logs.rows_affected() > 0 {
            tracing::debug!(
                "Deleted {} download logs of file {}",
                logs.rows_affected(),
                id
            );
        }

        let file = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(db_error("delete file"))?;

        Ok(file.rows_affected() > 0)
    }

    /// Resolve a conditional statement that touched no row into the reason
    /// it did not apply
    fn miss(exists: bool, when_present: TransitionOutcome) -> TransitionOutcome {
        if exists {
            when_present
        } else {
            TransitionOutcome::NotFound
        }
    }
}

#[async_trait]
impl RetentionStore for PgRetentionStore {
    async fn insert_file(&self, file: &NewFile) -> Result<File> {
        let sql = format!(
            r#"
            INSERT INTO files (
                id, owner_id, file_name, size_bytes, content_hash, uploaded_at,
                expires_at, unlimited_time, downloads_remaining, unlimited_downloads
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {FILE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, File>(&sql)
            .bind(&file.id)
            .bind(file.owner_id)
            .bind(&file.file_name)
            .bind(file.size_bytes)
            .bind(&file.content_hash)
            .bind(file.uploaded_at)
            .bind(file.expires_at)
            .bind(file.unlimited_time)
            .bind(file.downloads_remaining)
            .bind(file.unlimited_downloads)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("insert file"))
    }

    async fn get_file(&self, id: &str) -> Result<Option<File>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = $1");

        sqlx::query_as::<_, File>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get file"))
    }

    async fn list_files_due_for_trash(
        &self,
        now: DateTime<Utc>,
        after: Option<&str>,
        limit: i64,
    ) -> Result<Vec<File>> {
        let sql = format!(
            r#"
            SELECT {FILE_COLUMNS}
            FROM files
            WHERE soft_deleted_at IS NULL
              AND (
                (NOT unlimited_time AND expires_at IS NOT NULL AND expires_at <= $1)
                OR (NOT unlimited_downloads AND downloads_remaining <= 0)
              )
              AND ($2::TEXT IS NULL OR id > $2)
            ORDER BY id
            LIMIT $3
            "#
        );

        sqlx::query_as::<_, File>(&sql)
            .bind(now)
            .bind(after)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list files due for trash"))
    }

    async fn list_trashed_files_before(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<&str>,
        limit: i64,
    ) -> Result<Vec<File>> {
        let sql = format!(
            r#"
            SELECT {FILE_COLUMNS}
            FROM files
            WHERE soft_deleted_at IS NOT NULL
              AND soft_deleted_at <= $1
              AND ($2::TEXT IS NULL OR id > $2)
            ORDER BY id
            LIMIT $3
            "#
        );

        sqlx::query_as::<_, File>(&sql)
            .bind(cutoff)
            .bind(after)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list trashed files"))
    }

    async fn list_files_by_owner(
        &self,
        owner_id: Uuid,
        after: Option<&str>,
        limit: i64,
    ) -> Result<Vec<File>> {
        let sql = format!(
            r#"
            SELECT {FILE_COLUMNS}
            FROM files
            WHERE owner_id = $1
              AND ($2::TEXT IS NULL OR id > $2)
            ORDER BY id
            LIMIT $3
            "#
        );

        sqlx::query_as::<_, File>(&sql)
            .bind(owner_id)
            .bind(after)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list files by owner"))
    }

    async fn mark_file_trashed(
        &self,
        id: &str,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE files
            SET soft_deleted_at = $2, soft_deleted_by = $3
            WHERE id = $1 AND soft_deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(at)
        .bind(actor_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("trash file"))?;

        if result.rows_affected() > 0 {
            return Ok(TransitionOutcome::Applied);
        }
        Ok(Self::miss(
            self.file_exists(id).await?,
            TransitionOutcome::AlreadyApplied,
        ))
    }

    async fn clear_file_trash(&self, id: &str) -> Result<TransitionOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE files
            SET soft_deleted_at = NULL, soft_deleted_by = NULL
            WHERE id = $1 AND soft_deleted_at IS NOT NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error("restore file"))?;

        if result.rows_affected() > 0 {
            return Ok(TransitionOutcome::Applied);
        }
        Ok(Self::miss(
            self.file_exists(id).await?,
            TransitionOutcome::AlreadyApplied,
        ))
    }

    async fn record_download(
        &self,
        file_id: &str,
        download_account_id: Option<Uuid>,
        email: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("begin download transaction"))?;

        let result = sqlx::query(
            r#"
            UPDATE files
            SET downloads_remaining = CASE
                    WHEN unlimited_downloads THEN downloads_remaining
                    ELSE downloads_remaining - 1
                END,
                download_count = download_count + 1
            WHERE id = $1
              AND soft_deleted_at IS NULL
              AND (unlimited_time OR expires_at IS NULL OR expires_at > $2)
              AND (unlimited_downloads OR downloads_remaining > 0)
            "#,
        )
        .bind(file_id)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("consume download"))?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(db_error("roll back download transaction"))?;
            return Ok(Self::miss(
                self.file_exists(file_id).await?,
                TransitionOutcome::NotEligible,
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO download_logs (file_id, download_account_id, email, downloaded_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(file_id)
        .bind(download_account_id)
        .bind(email)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("insert download log"))?;

        tx.commit()
            .await
            .map_err(db_error("commit download transaction"))?;

        Ok(TransitionOutcome::Applied)
    }

    async fn purge_trashed_file(
        &self,
        id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("begin purge transaction"))?;

        // Row lock keeps a concurrent restore out until the delete commits
        let due = sqlx::query_scalar::<_, String>(
            r#"
            SELECT id FROM files
            WHERE id = $1 AND soft_deleted_at IS NOT NULL AND soft_deleted_at <= $2
            FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(cutoff)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("lock trashed file"))?;

        if due.is_none() {
            tx.rollback()
                .await
                .map_err(db_error("roll back purge transaction"))?;
            return Ok(Self::miss(
                self.file_exists(id).await?,
                TransitionOutcome::NotEligible,
            ));
        }

        Self::delete_file_rows(&mut tx, id).await?;

        tx.commit()
            .await
            .map_err(db_error("commit purge transaction"))?;

        Ok(TransitionOutcome::Applied)
    }

    async fn purge_file(&self, id: &str) -> Result<TransitionOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("begin purge transaction"))?;

        let deleted = Self::delete_file_rows(&mut tx, id).await?;

        tx.commit()
            .await
            .map_err(db_error("commit purge transaction"))?;

        Ok(if deleted {
            TransitionOutcome::Applied
        } else {
            TransitionOutcome::NotFound
        })
    }

    async fn sum_untrashed_file_bytes(&self, owner_id: Uuid) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(size_bytes), 0)::BIGINT
            FROM files
            WHERE owner_id = $1 AND soft_deleted_at IS NULL
            "#,
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("sum file sizes"))
    }

    async fn set_consumed_storage(
        &self,
        user_id: Uuid,
        megabytes: i64,
    ) -> Result<TransitionOutcome> {
        let result = sqlx::query("UPDATE users SET consumed_storage_mb = $2 WHERE id = $1")
            .bind(user_id)
            .bind(megabytes)
            .execute(&self.pool)
            .await
            .map_err(db_error("update consumed storage"))?;

        Ok(if result.rows_affected() > 0 {
            TransitionOutcome::Applied
        } else {
            TransitionOutcome::NotFound
        })
    }

    async fn get_account(&self, kind: AccountKind, id: Uuid) -> Result<Option<Account>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
            account_columns(kind),
            kind.table()
        );

        sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get account"))
    }

    async fn mark_account_soft_deleted(
        &self,
        kind: AccountKind,
        id: Uuid,
        anonymized_email: &str,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        // SET expressions see the pre-update row, so original_email gets the
        // address being replaced
        let sql = format!(
            r#"
            UPDATE {}
            SET original_email = email,
                email = $2,
                is_active = FALSE,
                soft_deleted_at = $3,
                soft_deleted_by = $4
            WHERE id = $1 AND soft_deleted_at IS NULL
            "#,
            kind.table()
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .bind(anonymized_email)
            .bind(at)
            .bind(actor_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("soft delete account"))?;

        if result.rows_affected() > 0 {
            return Ok(TransitionOutcome::Applied);
        }
        Ok(Self::miss(
            self.account_exists(kind, id).await?,
            TransitionOutcome::AlreadyApplied,
        ))
    }

    async fn anonymize_download_logs(
        &self,
        account_id: Uuid,
        anonymized_email: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE download_logs
            SET email = $2
            WHERE download_account_id = $1 AND email IS DISTINCT FROM $2
            "#,
        )
        .bind(account_id)
        .bind(anonymized_email)
        .execute(&self.pool)
        .await
        .map_err(db_error("anonymize download logs"))?;

        Ok(result.rows_affected())
    }

    async fn list_accounts_soft_deleted_before(
        &self,
        kind: AccountKind,
        cutoff: DateTime<Utc>,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Account>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM {}
            WHERE soft_deleted_at IS NOT NULL
              AND soft_deleted_at <= $1
              AND ($2::UUID IS NULL OR id > $2)
            ORDER BY id
            LIMIT $3
            "#,
            account_columns(kind),
            kind.table()
        );

        sqlx::query_as::<_, Account>(&sql)
            .bind(cutoff)
            .bind(after)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list soft-deleted accounts"))
    }

    async fn delete_download_logs_for_account(&self, account_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM download_logs WHERE download_account_id = $1")
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete download logs for account"))?;

        Ok(result.rows_affected())
    }

    async fn delete_file_requests_by_owner(&self, owner_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM file_requests WHERE owner_id = $1")
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete file requests by owner"))?;

        Ok(result.rows_affected())
    }

    async fn delete_soft_deleted_account(
        &self,
        kind: AccountKind,
        id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let sql = format!(
            r#"
            DELETE FROM {}
            WHERE id = $1 AND soft_deleted_at IS NOT NULL AND soft_deleted_at <= $2
            "#,
            kind.table()
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete account"))?;

        if result.rows_affected() > 0 {
            return Ok(TransitionOutcome::Applied);
        }
        Ok(Self::miss(
            self.account_exists(kind, id).await?,
            TransitionOutcome::NotEligible,
        ))
    }

    async fn list_file_requests_expired_before(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<&str>,
        limit: i64,
    ) -> Result<Vec<FileRequest>> {
        sqlx::query_as::<_, FileRequest>(
            r#"
            SELECT id, owner_id, name, deadline, created_at
            FROM file_requests
            WHERE deadline IS NOT NULL
              AND deadline < $1
              AND ($2::TEXT IS NULL OR id > $2)
            ORDER BY id
            LIMIT $3
            "#,
        )
        .bind(cutoff)
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list expired file requests"))
    }

    async fn delete_expired_file_request(
        &self,
        id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let result = sqlx::query(
            r#"
            DELETE FROM file_requests
            WHERE id = $1 AND deadline IS NOT NULL AND deadline < $2
            "#,
        )
        .bind(id)
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(db_error("delete file request"))?;

        if result.rows_affected() > 0 {
            return Ok(TransitionOutcome::Applied);
        }

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM file_requests WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("look up file request"))?;

        Ok(Self::miss(exists, TransitionOutcome::NotEligible))
    }

    async fn append_audit(
        &self,
        entry: &NewAuditEntry,
        at: DateTime<Utc>,
    ) -> Result<AuditEntry> {
        let sql = format!(
            r#"
            INSERT INTO audit_log (
                id, created_at, actor_id, actor_email, action, entity_type,
                entity_id, success, details, entry_size
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {AUDIT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, AuditEntry>(&sql)
            .bind(Uuid::now_v7())
            .bind(at)
            .bind(&entry.actor_id)
            .bind(&entry.actor_email)
            .bind(entry.action.as_str())
            .bind(entry.entity_type.as_str())
            .bind(&entry.entity_id)
            .bind(entry.success)
            .bind(&entry.details)
            .bind(entry.approximate_size())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("append audit entry"))
    }

    async fn list_audit(
        &self,
        filter: &AuditFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<AuditEntry>, i64)> {
        const FILTER: &str = r#"
            ($1::TEXT IS NULL OR entity_type = $1)
            AND ($2::TEXT IS NULL OR entity_id = $2)
            AND ($3::TEXT IS NULL OR action = $3)
        "#;

        let entity_type = filter.entity_type.map(|t| t.as_str());
        let action = filter.action.map(|a| a.as_str());

        let total_sql = format!("SELECT COUNT(*) FROM audit_log WHERE {FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&total_sql)
            .bind(entity_type)
            .bind(filter.entity_id.as_deref())
            .bind(action)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count audit entries"))?;

        let sql = format!(
            r#"
            SELECT {AUDIT_COLUMNS}
            FROM audit_log
            WHERE {FILTER}
            ORDER BY created_at DESC, id DESC
            OFFSET $4 LIMIT $5
            "#
        );
        let items = sqlx::query_as::<_, AuditEntry>(&sql)
            .bind(entity_type)
            .bind(filter.entity_id.as_deref())
            .bind(action)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list audit entries"))?;

        Ok((items, total))
    }

    async fn delete_audit_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM audit_log WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete old audit entries"))?;

        Ok(result.rows_affected())
    }

    async fn audit_total_size(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COALESCE(SUM(entry_size), 0)::BIGINT FROM audit_log")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("sum audit size"))
    }

    async fn oldest_audit_sizes(&self, limit: i64) -> Result<Vec<(Uuid, i64)>> {
        sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT id, entry_size
            FROM audit_log
            ORDER BY created_at ASC, id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list oldest audit entries"))
    }

    async fn delete_audit_entries(&self, ids: &[Uuid]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM audit_log WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete audit entries"))?;

        Ok(result.rows_affected())
    }
}
