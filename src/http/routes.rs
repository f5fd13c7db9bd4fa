use super::handlers;
use super::request_id::request_id_middleware;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let json_limit = state.limits.json_body_bytes;
    let upload_limit = state.limits.upload_body_bytes;

    Router::new()
        // Liveness
        .route("/", get(handlers::status))
        .route("/health", get(handlers::health_check))
        // Render from URLs (JSON)
        .route(
            "/render",
            post(handlers::render).layer(DefaultBodyLimit::max(json_limit)),
        )
        // Render from uploaded audio (multipart); `/upload` is the legacy path
        .route(
            "/render-upload",
            post(handlers::render_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/upload",
            post(handlers::render_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .layer(middleware::from_fn(request_id_middleware))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
