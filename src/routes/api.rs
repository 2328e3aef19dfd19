use crate::handlers::{
    create_clip, diagnostics, edit_clip, get_clip, get_clip_meta, health_check, ready_check,
};
use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create API routes
pub fn create_api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/v1/diagnostics", get(diagnostics))
        .route("/v1/clips", post(create_clip))
        .route("/v1/clips/:id", get(get_clip))
        .route("/v1/clips/:id/meta", get(get_clip_meta))
        .route("/v1/clips/:id/edit", post(edit_clip))
        .with_state(state)
}
