//! Health check service.

use crate::{dto::health::HealthResponse, state::SharedState};

/// Gather liveness gauges for the health endpoint.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let queue_depth = state.queue().lock().await.len();

    HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: state
            .started_at()
            .elapsed()
            .unwrap_or_default()
            .as_secs(),
        connected_players: state.connected_players(),
        queue_depth,
        active_duels: state.active_duels(),
        catalog_size: state.catalog().len(),
    }
}
