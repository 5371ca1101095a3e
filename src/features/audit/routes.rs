use axum::{routing::get, Router};
use std::sync::Arc;

use crate::features::audit::handlers;
use crate::features::audit::services::AuditService;

pub fn routes(audit: Arc<AuditService>) -> Router {
    Router::new()
        .route("/api/admin/audit", get(handlers::list_audit))
        .with_state(audit)
}
