use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::store::StoreError;

/// Response for an error
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: u16,
    pub status: String,
    pub error: String,
}

/// Everything the synchronization core can reject an operation with.
///
/// `Store` is the only variant that is never surfaced to a client: failed
/// writes are retried on the next debounce cycle or forced flush.
#[derive(Debug)]
pub enum SyncError {
    /// Identifier does not match the 4-5 digit format
    InvalidIdentifier,
    /// Identifier unknown or expired. The two are indistinguishable.
    NotFound,
    /// Session does not hold creator authority for the room
    Unauthorized,
    /// Session is not joined to the room the operation names
    NotInRoom,
    /// Content exceeds the size ceiling
    PayloadTooLarge,
    /// Both the narrow and the fallback identifier space collided
    AllocationExhausted,
    /// Durable store failure
    Store(StoreError),
    /// Anything else that should surface as a server fault
    Internal(String),
}

impl SyncError {
    /// Machine-checkable reason emitted in wire `error` events
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::InvalidIdentifier => "invalid-identifier",
            SyncError::NotFound => "not-found",
            SyncError::Unauthorized => "unauthorized",
            SyncError::NotInRoom => "not-in-room",
            SyncError::PayloadTooLarge => "payload-too-large",
            SyncError::AllocationExhausted => "allocation-exhausted",
            SyncError::Store(_) | SyncError::Internal(_) => "internal",
        }
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::InvalidIdentifier => write!(f, "Invalid clipboard ID format"),
            SyncError::NotFound => write!(f, "Clip not found or expired"),
            SyncError::Unauthorized => write!(f, "Only the creator can edit"),
            SyncError::NotInRoom => write!(f, "Not in this room"),
            SyncError::PayloadTooLarge => write!(f, "Content too large. Maximum size is 100KB."),
            SyncError::AllocationExhausted => write!(f, "Could not allocate a free clipboard ID"),
            SyncError::Store(e) => write!(f, "Store error: {}", e),
            SyncError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        SyncError::Store(e)
    }
}
