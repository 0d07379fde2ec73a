//! Health check response payload.

use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route, including a few
/// orchestrator gauges useful for dashboards.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status; always "ok" while the process serves traffic.
    pub status: String,
    /// Seconds since process start.
    pub uptime_seconds: u64,
    /// Players currently connected.
    pub connected_players: usize,
    /// Users waiting in the matchmaking queue.
    pub queue_depth: usize,
    /// Match records currently stored, finished ones included.
    pub active_duels: usize,
    /// Questions available in the catalog.
    pub catalog_size: usize,
}
