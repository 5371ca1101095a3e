use axum::{routing::post, Router};
use std::sync::Arc;

use crate::features::sweeps::handlers;
use crate::features::sweeps::services::SweepService;

pub fn routes(sweeps: Arc<SweepService>) -> Router {
    Router::new()
        .route("/api/admin/sweeps/{sweep}/run", post(handlers::run_sweep))
        .with_state(sweeps)
}
