use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::audit::models::{AuditAction, AuditEntry, AuditFilter, EntityType};
use crate::shared::constants::DEFAULT_PAGE_SIZE;
use crate::shared::types::PaginationQuery;

/// Query params for listing audit entries
#[derive(Debug, Clone, Deserialize, IntoParams, Validate)]
pub struct AuditQueryParams {
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    #[param(minimum = 1)]
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: i64,
    /// Items per page
    #[serde(default = "default_page_size")]
    #[param(minimum = 1, maximum = 100)]
    #[validate(range(min = 1, max = 100, message = "Page size must be 1-100"))]
    pub page_size: i64,
    /// Filter by entity type
    pub entity_type: Option<EntityType>,
    /// Filter by entity id
    #[validate(length(min = 1, max = 255, message = "Entity id must be 1-255 characters"))]
    pub entity_id: Option<String>,
    /// Filter by action tag, e.g. `FILE_PURGED`
    pub action: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl AuditQueryParams {
    pub fn filter(&self) -> Result<AuditFilter> {
        let action = self
            .action
            .as_deref()
            .map(str::parse::<AuditAction>)
            .transpose()
            .map_err(AppError::Validation)?;

        Ok(AuditFilter {
            entity_type: self.entity_type,
            entity_id: self.entity_id.clone(),
            action,
        })
    }

    pub fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// One audit log entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEntryDto {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub actor_id: String,
    pub actor_email: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub success: bool,
    #[schema(value_type = Object)]
    pub details: Value,
    /// Approximate stored size in bytes, counted by the size-based purge
    pub entry_size: i64,
}

impl From<AuditEntry> for AuditEntryDto {
    fn from(entry: AuditEntry) -> Self {
        Self {
            id: entry.id,
            created_at: entry.created_at,
            actor_id: entry.actor_id,
            actor_email: entry.actor_email,
            action: entry.action,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            success: entry.success,
            details: entry.details,
            entry_size: entry.entry_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(action: Option<&str>) -> AuditQueryParams {
        AuditQueryParams {
            page: 1,
            page_size: 20,
            entity_type: Some(EntityType::File),
            entity_id: Some("f1".to_string()),
            action: action.map(str::to_string),
        }
    }

    #[test]
    fn test_filter_parses_action_case_insensitively() {
        let filter = params(Some("file_purged")).filter().unwrap();
        assert_eq!(filter.action, Some(AuditAction::FilePurged));
        assert_eq!(filter.entity_type, Some(EntityType::File));
    }

    #[test]
    fn test_unknown_action_is_a_validation_error() {
        assert!(matches!(
            params(Some("FILE_EXPLODED")).filter(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_page_size_bounds() {
        let mut query = params(None);
        query.page_size = 0;
        assert!(query.validate().is_err());
        query.page_size = 100;
        assert!(query.validate().is_ok());
    }
}
