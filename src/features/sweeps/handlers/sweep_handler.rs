use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::core::error::Result;
use crate::core::extractor::AdminIdentity;
use crate::features::sweeps::dtos::SweepRunDto;
use crate::features::sweeps::models::SweepKind;
use crate::features::sweeps::services::SweepService;
use crate::shared::types::ApiResponse;

/// Run one sweep now, outside its schedule
#[utoipa::path(
    post,
    path = "/api/admin/sweeps/{sweep}/run",
    params(("sweep" = SweepKind, Path, description = "Sweep to run")),
    responses(
        (status = 200, description = "Sweep finished", body = ApiResponse<SweepRunDto>),
        (status = 400, description = "Unknown sweep"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "sweeps",
    security(
        ("basic_auth" = [])
    )
)]
pub async fn run_sweep(
    admin: AdminIdentity,
    State(service): State<Arc<SweepService>>,
    Path(sweep): Path<SweepKind>,
) -> Result<Json<ApiResponse<SweepRunDto>>> {
    tracing::info!("Sweep {} triggered by {}", sweep, admin.username);

    let report = service.run(sweep).await?;

    Ok(Json(ApiResponse::success(
        Some(SweepRunDto { sweep, report }),
        Some(report.to_string()),
        None,
    )))
}
