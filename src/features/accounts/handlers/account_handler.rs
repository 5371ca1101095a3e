use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::core::error::Result;
use crate::core::extractor::AdminIdentity;
use crate::features::accounts::dtos::AccountTransitionDto;
use crate::features::accounts::models::AccountKind;
use crate::features::accounts::services::AccountLifecycleService;
use crate::shared::types::ApiResponse;

/// Soft-delete a user: anonymize the account and trash its active files
#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Deletion handled (see outcome)", body = ApiResponse<AccountTransitionDto>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "accounts",
    security(
        ("basic_auth" = [])
    )
)]
pub async fn delete_user(
    admin: AdminIdentity,
    State(service): State<Arc<AccountLifecycleService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<AccountTransitionDto>>> {
    let outcome = service.soft_delete_user(id, &admin.actor()).await?;

    Ok(Json(ApiResponse::success(
        Some(AccountTransitionDto {
            account_id: id,
            kind: AccountKind::User,
            outcome,
        }),
        None,
        None,
    )))
}

/// Soft-delete a download account and anonymize its download history
#[utoipa::path(
    delete,
    path = "/api/admin/download-accounts/{id}",
    params(("id" = Uuid, Path, description = "Download account id")),
    responses(
        (status = 200, description = "Deletion handled (see outcome)", body = ApiResponse<AccountTransitionDto>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "accounts",
    security(
        ("basic_auth" = [])
    )
)]
pub async fn delete_download_account(
    admin: AdminIdentity,
    State(service): State<Arc<AccountLifecycleService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<AccountTransitionDto>>> {
    let outcome = service
        .soft_delete_download_account(id, &admin.actor())
        .await?;

    Ok(Json(ApiResponse::success(
        Some(AccountTransitionDto {
            account_id: id,
            kind: AccountKind::DownloadAccount,
            outcome,
        }),
        None,
        None,
    )))
}
