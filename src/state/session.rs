//! Per-connection player session tracked by the connection registry.

use std::time::SystemTime;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Live state for one connected player.
///
/// Created after the identification handshake, mutated as the player enters
/// and leaves the queue or a match, and discarded on disconnect. A session
/// carries `current_match_id` exactly while its user participates in a live
/// match record.
#[derive(Debug, Clone)]
pub struct PlayerSession {
    /// Opaque stable identifier of the authenticated user.
    pub user_id: Uuid,
    /// Display name shown to the opponent.
    pub name: String,
    /// Handle used to push messages to the player's WebSocket.
    pub tx: mpsc::UnboundedSender<Message>,
    /// Whether the player currently sits in the matchmaking queue.
    pub is_searching: bool,
    /// Identifier of the live match the player participates in, if any.
    pub current_match_id: Option<Uuid>,
    /// Timestamp of connection establishment.
    pub connected_at: SystemTime,
}

impl PlayerSession {
    /// Build a fresh session for a connection that just identified itself.
    pub fn new(user_id: Uuid, name: String, tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            user_id,
            name,
            tx,
            is_searching: false,
            current_match_id: None,
            connected_at: SystemTime::now(),
        }
    }

    /// Public profile projection shared with the opponent at pairing time.
    pub fn profile(&self) -> (Uuid, String) {
        (self.user_id, self.name.clone())
    }
}
