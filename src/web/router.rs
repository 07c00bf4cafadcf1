//! Router configuration for the drive server.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{create_folder, file_uploaded, request_upload, AppState};

/// Create the main API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let webhook_routes = Router::new().route("/file/uploaded", post(file_uploaded));

    let api_routes = Router::new()
        .route("/folders", post(create_folder))
        .route("/files/upload", post(request_upload))
        .nest("/webhook", webhook_routes);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(create_health_router())
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
