use axum::{routing::delete, Router};
use std::sync::Arc;

use crate::features::accounts::handlers;
use crate::features::accounts::services::AccountLifecycleService;

/// Admin routes for account removal
pub fn routes(accounts: Arc<AccountLifecycleService>) -> Router {
    Router::new()
        .route("/api/admin/users/{id}", delete(handlers::delete_user))
        .route(
            "/api/admin/download-accounts/{id}",
            delete(handlers::delete_download_account),
        )
        .with_state(accounts)
}
