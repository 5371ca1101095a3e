use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::features::files::dtos::MAX_UPLOAD_BYTES;
use crate::features::files::handlers::{self, FileHandlerState};
use crate::features::files::services::{FileLifecycleService, QuotaService};

/// Admin routes for uploads, downloads, file transitions and quota
/// maintenance
pub fn routes(
    files: Arc<FileLifecycleService>,
    quota: Arc<QuotaService>,
    trash_retention_days: i64,
) -> Router {
    let state = FileHandlerState {
        files,
        quota,
        trash_retention: chrono::Duration::days(trash_retention_days),
    };

    Router::new()
        .route(
            "/api/admin/users/{id}/files",
            // Room for the multipart framing around the file part
            post(handlers::upload_file)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024)),
        )
        .route("/api/admin/files/{id}/download", get(handlers::download_file))
        .route("/api/admin/files/{id}/trash", post(handlers::trash_file))
        .route("/api/admin/files/{id}/restore", post(handlers::restore_file))
        .route("/api/admin/files/{id}/purge", post(handlers::purge_file))
        .route("/api/admin/users/{id}/quota", post(handlers::recompute_quota))
        .with_state(state)
}
