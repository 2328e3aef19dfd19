use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for creating a clip
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CreateClipRequest {
    #[serde(default)]
    pub content: String,
}

/// Response for a created clip.
///
/// `creator_secret` is returned exactly once and is never recoverable
/// afterwards; only its hash is stored.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateClipResponse {
    pub clipboard_id: String,
    pub creator_secret: String,
    pub url: String,
}

/// Response for reading a clip
#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClipResponse {
    pub clipboard_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub size_bytes: i64,
}

/// Clip metadata without content
#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClipMetaResponse {
    pub clipboard_id: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Request body for editing a clip over HTTP
#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditClipRequest {
    pub content: String,
    /// Accepted here as a fallback for clients that cannot set headers
    pub creator_secret: Option<String>,
}

/// Response for an accepted HTTP edit
#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditClipResponse {
    pub clipboard_id: String,
    pub content: String,
    pub last_updated: DateTime<Utc>,
}
