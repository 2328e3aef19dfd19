use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

use crate::handlers::error_response;
use crate::models::{EditClipRequest, EditClipResponse, ErrorResponse};
use crate::services::clip_service;
use crate::AppState;

/// Edit a clip over HTTP, as a fallback for clients without a socket.
///
/// Observes the same authorization and size rules as the socket path and
/// converges on the same room state when one is active.
pub async fn edit_clip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<EditClipRequest>,
) -> Result<(StatusCode, Json<EditClipResponse>), (StatusCode, Json<ErrorResponse>)> {
    let secret = bearer_token(&headers).or(payload.creator_secret);
    let Some(secret) = secret else {
        let status = StatusCode::UNAUTHORIZED;
        return Err((
            status,
            Json(ErrorResponse {
                code: status.as_u16(),
                status: status.to_string(),
                error: "Creator secret required".to_string(),
            }),
        ));
    };

    match clip_service::edit_clip(&state, &id, payload.content, &secret).await {
        Ok(response) => Ok((StatusCode::OK, Json(response))),
        Err(e) => Err(error_response(e)),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ").map(str::to_string)
}
