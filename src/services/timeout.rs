//! One-shot deadline supervision for answering phases and record cleanup.
//!
//! Timers are fire-and-forget tasks keyed by match id. Staleness is handled
//! at the receiving end: the deadline callback re-fetches the record and
//! no-ops when the phase already advanced, so a timer armed under one phase
//! can never corrupt a later one.

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;
use uuid::Uuid;

use crate::{services::duel_service, state::SharedState};

/// Arm the answering-phase wall-clock deadline for a match.
pub fn arm_answering_deadline(state: SharedState, match_id: Uuid, limit: Duration) {
    tokio::spawn(async move {
        sleep(limit).await;
        duel_service::force_finish(&state, match_id).await;
    });
}

/// Remove a finished match record once its grace window elapses.
///
/// The window keeps the final state readable for clients that lagged behind
/// the resolution broadcast.
pub fn schedule_removal(state: SharedState, match_id: Uuid, grace: Duration) {
    tokio::spawn(async move {
        sleep(grace).await;
        if state.remove_duel(match_id) {
            debug!(%match_id, "removed finished match record after grace window");
        }
    });
}
