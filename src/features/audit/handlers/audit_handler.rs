use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AdminIdentity;
use crate::features::audit::dtos::{AuditEntryDto, AuditQueryParams};
use crate::features::audit::services::AuditService;
use crate::shared::types::{ApiResponse, Meta};

/// List audit entries, newest first
#[utoipa::path(
    get,
    path = "/api/admin/audit",
    params(AuditQueryParams),
    responses(
        (status = 200, description = "Audit entries", body = ApiResponse<Vec<AuditEntryDto>>),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "audit",
    security(
        ("basic_auth" = [])
    )
)]
pub async fn list_audit(
    _admin: AdminIdentity,
    State(service): State<Arc<AuditService>>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<ApiResponse<Vec<AuditEntryDto>>>> {
    params
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let filter = params.filter()?;
    let (entries, total) = service.list(&filter, &params.pagination()).await?;
    let items = entries.into_iter().map(AuditEntryDto::from).collect();

    Ok(Json(ApiResponse::success(
        Some(items),
        None,
        Some(Meta { total }),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::audit::models::{AuditAction, EntityType, NewAuditEntry};
    use crate::features::audit::routes;
    use crate::shared::lifecycle::Actor;
    use crate::shared::test_helpers::{admin_auth, admin_server, TestServices};

    async fn seed(services: &TestServices) {
        for id in ["f1", "f2", "f1"] {
            services
                .audit
                .record(NewAuditEntry::new(
                    AuditAction::FileTrashed,
                    EntityType::File,
                    id,
                    &Actor::System,
                ))
                .await;
        }
        services
            .audit
            .record(NewAuditEntry::new(
                AuditAction::FilePurged,
                EntityType::File,
                "f1",
                &Actor::System,
            ))
            .await;
    }

    #[tokio::test]
    async fn test_list_audit_filters_and_counts() {
        let services = TestServices::new();
        seed(&services).await;
        let server = admin_server(routes(services.audit.clone()));
        let (name, value) = admin_auth();

        let response = server
            .get("/api/admin/audit")
            .add_query_param("entity_id", "f1")
            .add_query_param("action", "FILE_TRASHED")
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let body: ApiResponse<Vec<AuditEntryDto>> = response.json();
        assert_eq!(body.meta.unwrap().total, 2);
        let items = body.data.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items
            .iter()
            .all(|e| e.entity_id == "f1" && e.action == "FILE_TRASHED"));
        assert!(items.iter().all(|e| e.entry_size > 0));

        let paged: ApiResponse<Vec<AuditEntryDto>> = server
            .get("/api/admin/audit")
            .add_query_param("page_size", 1)
            .add_header(name, value)
            .await
            .json();
        assert_eq!(paged.meta.unwrap().total, 4);
        assert_eq!(paged.data.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_audit_rejects_unknown_action() {
        let services = TestServices::new();
        let server = admin_server(routes(services.audit.clone()));
        let (name, value) = admin_auth();

        let response = server
            .get("/api/admin/audit")
            .add_query_param("action", "NOPE")
            .add_header(name, value)
            .await;

        response.assert_status_bad_request();
    }
}
