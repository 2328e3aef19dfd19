use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::registry::RoomHandle;

/// Membership of a session in one room.
///
/// `is_creator` is resolved once at join time and trusted for the life of
/// the session; the protocol never re-presents the secret.
pub struct LiveRoom {
    pub room: Arc<RoomHandle>,
    pub is_creator: bool,
    /// Task forwarding room broadcasts to this session's socket
    pub forward: JoinHandle<()>,
}

/// Per-connection state. One session exists per live socket and belongs to
/// at most one room at a time.
pub struct SessionCtx {
    pub connection_id: Uuid,
    pub live: Option<LiveRoom>,
}

impl SessionCtx {
    pub fn new() -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            live: None,
        }
    }
}
