use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Aggregated state of the sync core plus host statistics
#[derive(Serialize, Deserialize, ToSchema)]
pub struct DiagnosticsResponse {
    pub n_rooms: u32,
    pub n_sessions: u32,
    pub n_dirty_rooms: u32,
    pub n_pending_flushes: u32,
    pub cpu_usage: f32,
    pub memory_alloc: u64,
    pub memory_total: u64,
    pub memory_free: u64,
}
