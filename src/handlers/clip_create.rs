use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::error;

use crate::handlers::error_response;
use crate::models::{CreateClipRequest, CreateClipResponse, ErrorResponse};
use crate::services::clip_service;
use crate::AppState;

/// Create a clip and hand back its identifier plus the one-time creator
/// secret
pub async fn create_clip(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateClipRequest>,
) -> Result<(StatusCode, Json<CreateClipResponse>), (StatusCode, Json<ErrorResponse>)> {
    match clip_service::create_clip(&state, payload.content).await {
        Ok(response) => Ok((StatusCode::CREATED, Json(response))),
        Err(e) => {
            error!("Failed to create clip: {}", e);
            Err(error_response(e))
        }
    }
}
