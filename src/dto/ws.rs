//! WebSocket message envelopes exchanged with duel clients.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::duel::{
    AnswerView, CatalogQuestion, MatchFinishedPayload, MatchFoundPayload, PlayerProfile,
    SelectionView,
};

#[derive(Debug, Deserialize, ToSchema)]
/// Messages accepted from duel WebSocket clients.
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Post-connection handshake carrying the authenticated identity.
    Identify {
        /// Stable user identifier.
        user_id: Uuid,
        /// Display name shown to the opponent.
        name: String,
    },
    /// Enter the matchmaking queue.
    SearchMatch,
    /// Leave the matchmaking queue.
    CancelSearch,
    /// Pick a question for the opponent during the selection phase.
    SelectQuestion {
        /// Match the selection targets.
        match_id: Uuid,
        /// Catalog question to add.
        question_id: u32,
    },
    /// Answer an assigned question during the answering phase.
    AnswerQuestion {
        /// Match the answer targets.
        match_id: Uuid,
        /// Assigned question being answered.
        question_id: u32,
        /// Option index the player picked.
        selected_option: usize,
        /// Client-measured response time in seconds.
        elapsed_seconds: f64,
    },
    /// Any unrecognized message type.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a client message from a raw JSON text frame.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Messages pushed to duel WebSocket clients.
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Handshake acknowledgement echoing the caller's own profile.
    Connected {
        /// The caller's registered profile.
        profile: PlayerProfile,
    },
    /// The caller is now queued for matchmaking.
    Searching,
    /// The caller's search was cancelled.
    SearchCancelled,
    /// A pairing committed; the duel starts in the selection phase.
    MatchFound(MatchFoundPayload),
    /// The caller's own selection was accepted.
    QuestionSelected(SelectionView),
    /// The opponent selected a question; progress and turn update only.
    OpponentSelected(SelectionView),
    /// The answering phase opened; carries only the recipient's questions.
    AnsweringPhaseStart {
        /// Match entering the answering phase.
        match_id: Uuid,
        /// The recipient's assigned questions.
        questions: Vec<CatalogQuestion>,
        /// Shared wall-clock budget in seconds.
        time_limit_seconds: u64,
    },
    /// The caller's own answer was recorded, with correctness and points.
    AnswerRecorded(AnswerView),
    /// The opponent answered another question; count only.
    OpponentProgress {
        /// Match the progress belongs to.
        match_id: Uuid,
        /// How many questions the opponent answered so far.
        answered_count: usize,
    },
    /// The opponent's connection dropped; the match is abandoned.
    OpponentDisconnected {
        /// Match that was abandoned.
        match_id: Uuid,
    },
    /// The duel resolved; tagged with the recipient's own outcome.
    MatchFinished(MatchFinishedPayload),
    /// A request was rejected; the connection stays open.
    Error {
        /// Human-readable rejection reason.
        message: String,
    },
}
