use crate::auth::{self, AdminToken};
use crate::metrics::handler::{self as metrics_handler, AdminState};
use crate::prediction::handler::{self as prediction_handler, PredictionState};
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

/// `/v1/predictions`: POST serves a prediction, GET describes the endpoint.
pub fn prediction_routes(state: Arc<PredictionState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route(
            "/v1/predictions",
            get(prediction_handler::capabilities).post(prediction_handler::predict),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// `/v1/admin/performance`, guarded by the admin token when one is configured.
pub fn admin_routes(state: Arc<AdminState>, token: Option<AdminToken>) -> Router {
    let router = Router::new()
        .route(
            "/v1/admin/performance",
            get(metrics_handler::get_performance).delete(metrics_handler::reset_performance),
        )
        .layer(middleware::from_fn(auth::require_admin_token));

    match token {
        Some(token) => router.layer(axum::Extension(token)).with_state(state),
        None => router.with_state(state),
    }
}

pub fn health_routes(state: Arc<AdminState>) -> Router {
    Router::new()
        .route("/health", get(metrics_handler::health))
        .with_state(state)
}
