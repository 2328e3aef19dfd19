pub mod clip_create;
pub mod clip_edit;
pub mod clip_read;
pub mod diagnostics;
pub mod health;

pub use clip_create::*;
pub use clip_edit::*;
pub use clip_read::*;
pub use diagnostics::*;
pub use health::*;

use axum::http::StatusCode;
use axum::Json;

use crate::models::{ErrorResponse, SyncError};

/// Map a sync-core rejection onto an HTTP error response
pub(crate) fn error_response(error: SyncError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        SyncError::InvalidIdentifier => StatusCode::BAD_REQUEST,
        SyncError::NotFound => StatusCode::NOT_FOUND,
        SyncError::Unauthorized => StatusCode::FORBIDDEN,
        SyncError::NotInRoom => StatusCode::BAD_REQUEST,
        SyncError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        SyncError::AllocationExhausted => StatusCode::SERVICE_UNAVAILABLE,
        SyncError::Store(_) | SyncError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            code: status.as_u16(),
            status: status.to_string(),
            error: error.to_string(),
        }),
    )
}
