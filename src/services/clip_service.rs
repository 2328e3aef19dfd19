use chrono::Utc;
use tracing::info;

use crate::db::store::StoredClip;
use crate::models::{
    ClipMetaResponse, ClipResponse, CreateClipResponse, EditClipResponse, SyncError,
};
use crate::services::{id_service, secret_service};
use crate::AppState;

/// Create a clip: allocate an identifier, mint the one-time creator secret
/// and persist the row. TTL starts counting from this moment and is never
/// extended.
pub async fn create_clip(
    state: &AppState,
    content: String,
) -> Result<CreateClipResponse, SyncError> {
    if content.len() > state.config.max_clip_bytes {
        return Err(SyncError::PayloadTooLarge);
    }

    let store = state.registry.store();
    let clipboard_id = id_service::allocate(store.as_ref()).await?;
    let creator_secret = secret_service::issue_secret();
    let creator_secret_hash =
        secret_service::hash_secret(&creator_secret).map_err(SyncError::Internal)?;

    let now = Utc::now();
    let clip = StoredClip {
        id: clipboard_id.clone(),
        size_bytes: content.len() as i64,
        content,
        created_at: now,
        last_updated: now,
        creator_secret_hash,
    };
    store.insert_clip(&clip).await?;

    info!("Created clip {} ({} bytes)", clipboard_id, clip.size_bytes);
    let url = format!("{}/clip/{}", state.config.frontend_base(), clipboard_id);
    Ok(CreateClipResponse {
        clipboard_id,
        creator_secret,
        url,
    })
}

/// Read a clip. An active room is authoritative for content and
/// last-updated (it runs ahead of the store by up to the debounce window).
pub async fn read_clip(state: &AppState, id: &str) -> Result<ClipResponse, SyncError> {
    if !id_service::is_valid_identifier(id) {
        return Err(SyncError::InvalidIdentifier);
    }
    let clip = state
        .registry
        .store()
        .load_clip(id)
        .await?
        .ok_or(SyncError::NotFound)?;

    let (content, last_updated) = match state.registry.room_snapshot(id).await {
        Some(live) => live,
        None => (clip.content, clip.last_updated),
    };

    Ok(ClipResponse {
        clipboard_id: clip.id,
        size_bytes: content.len() as i64,
        content,
        created_at: clip.created_at,
        last_updated,
    })
}

/// Read clip metadata without the content
pub async fn read_clip_meta(state: &AppState, id: &str) -> Result<ClipMetaResponse, SyncError> {
    let clip = read_clip(state, id).await?;
    Ok(ClipMetaResponse {
        clipboard_id: clip.clipboard_id,
        size_bytes: clip.size_bytes,
        created_at: clip.created_at,
        last_updated: clip.last_updated,
    })
}

/// Edit a clip over HTTP.
///
/// When a room is active the edit takes the same path as socket edits
/// (broadcast to viewers, debounced persistence); otherwise the secret is
/// verified against the stored hash and the write goes straight through.
pub async fn edit_clip(
    state: &AppState,
    id: &str,
    content: String,
    creator_secret: &str,
) -> Result<EditClipResponse, SyncError> {
    if !id_service::is_valid_identifier(id) {
        return Err(SyncError::InvalidIdentifier);
    }
    if content.len() > state.config.max_clip_bytes {
        return Err(SyncError::PayloadTooLarge);
    }

    if let Some(last_updated) = state
        .registry
        .edit_via_room(id, creator_secret, &content)
        .await?
    {
        return Ok(EditClipResponse {
            clipboard_id: id.to_string(),
            content,
            last_updated,
        });
    }

    let store = state.registry.store();
    let clip = store.load_clip(id).await?.ok_or(SyncError::NotFound)?;
    if !secret_service::verify_secret(creator_secret, &clip.creator_secret_hash) {
        return Err(SyncError::Unauthorized);
    }

    let now = Utc::now();
    if !store.update_content(id, &content, now).await? {
        // Expired between the load and the write
        return Err(SyncError::NotFound);
    }
    Ok(EditClipResponse {
        clipboard_id: id.to_string(),
        content,
        last_updated: now,
    })
}
