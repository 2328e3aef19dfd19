use utoipa::OpenApi;
use crate::models::*;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Create a new clip
#[utoipa::path(
    post,
    path = "/api/v1/clips",
    request_body = CreateClipRequest,
    responses(
        (status = 201, description = "Clip created, creator secret returned once", body = CreateClipResponse),
        (status = 413, description = "Content exceeds the size ceiling", body = ErrorResponse),
        (status = 503, description = "Identifier space exhausted", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn create_clip_doc() {}

/// Read a clip
#[utoipa::path(
    get,
    path = "/api/v1/clips/{id}",
    params(("id" = String, Path, description = "Clipboard identifier")),
    responses(
        (status = 200, description = "Current clip content", body = ClipResponse),
        (status = 404, description = "Clip not found or expired", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn get_clip_doc() {}

/// Read clip metadata
#[utoipa::path(
    get,
    path = "/api/v1/clips/{id}/meta",
    params(("id" = String, Path, description = "Clipboard identifier")),
    responses(
        (status = 200, description = "Clip metadata without content", body = ClipMetaResponse),
        (status = 404, description = "Clip not found or expired", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn get_clip_meta_doc() {}

/// Edit a clip
#[utoipa::path(
    post,
    path = "/api/v1/clips/{id}/edit",
    params(("id" = String, Path, description = "Clipboard identifier")),
    request_body = EditClipRequest,
    responses(
        (status = 200, description = "Edit accepted", body = EditClipResponse),
        (status = 401, description = "Creator secret missing", body = ErrorResponse),
        (status = 403, description = "Creator secret invalid", body = ErrorResponse),
        (status = 404, description = "Clip not found or expired", body = ErrorResponse),
        (status = 413, description = "Content exceeds the size ceiling", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn edit_clip_doc() {}

/// Diagnostics endpoint
#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    responses(
        (status = 200, description = "Sync core and host statistics", body = DiagnosticsResponse)
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        create_clip_doc,
        get_clip_doc,
        get_clip_meta_doc,
        edit_clip_doc,
        diagnostics_doc,
    ),
    components(
        schemas(
            HealthResponse,
            CreateClipRequest,
            CreateClipResponse,
            ClipResponse,
            ClipMetaResponse,
            EditClipRequest,
            EditClipResponse,
            DiagnosticsResponse,
            ErrorResponse
        )
    ),
    tags(
        (name = "api", description = "Clip API endpoints")
    )
)]
pub struct ApiDoc;
