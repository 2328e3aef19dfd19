use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::handlers::error_response;
use crate::models::{ClipMetaResponse, ClipResponse, ErrorResponse};
use crate::services::clip_service;
use crate::AppState;

/// Read a clip. TTL is fixed from creation and is not reset by reads.
pub async fn get_clip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ClipResponse>), (StatusCode, Json<ErrorResponse>)> {
    match clip_service::read_clip(&state, &id).await {
        Ok(response) => Ok((StatusCode::OK, Json(response))),
        Err(e) => Err(error_response(e)),
    }
}

/// Read clip metadata without the content
pub async fn get_clip_meta(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ClipMetaResponse>), (StatusCode, Json<ErrorResponse>)> {
    match clip_service::read_clip_meta(&state, &id).await {
        Ok(response) => Ok((StatusCode::OK, Json(response))),
        Err(e) => Err(error_response(e)),
    }
}
