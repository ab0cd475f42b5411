//! Router assembly for the semantic graph HTTP API.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the axum router with all API routes.
///
/// Routes use axum 0.8 `/{param}` path syntax. CORS is permissive and
/// TraceLayer provides request-level logging via tracing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/semantic-graph/bootstrap",
            post(handlers::jobs::start_bootstrap),
        )
        .route(
            "/semantic-graph/jobs/{job_id}",
            get(handlers::jobs::job_status),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
