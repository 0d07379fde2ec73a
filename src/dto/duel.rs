//! Projections of duel state exposed to clients, plus REST request bodies.
//!
//! Outbound projections are sanitized per recipient: a player only ever sees
//! their own selection and assignment lists, the opponent's public profile,
//! and the opponent's progress counts. Catalog questions never carry the
//! correct option index over the wire.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    catalog::Question,
    dto::format_system_time,
    state::duel::{MatchRecord, PlayerDuelState},
};

/// Public profile of a player as shared with the opponent.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerProfile {
    /// Stable user identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
}

/// A catalog question as shown to clients. The correct option stays server-side.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CatalogQuestion {
    /// Stable question identifier.
    pub id: u32,
    /// Category label.
    pub category: String,
    /// Prompt text.
    pub prompt: String,
    /// Ordered answer options.
    pub options: Vec<String>,
}

impl From<&Question> for CatalogQuestion {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id,
            category: question.category.clone(),
            prompt: question.prompt.clone(),
            options: question.options.clone(),
        }
    }
}

/// Payload delivered to both participants when a pairing commits.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchFoundPayload {
    /// Identifier of the freshly created match.
    pub match_id: Uuid,
    /// The other participant's public profile.
    pub opponent: PlayerProfile,
    /// Which participant holds the first selection turn.
    pub current_turn: Uuid,
    /// Whether the recipient holds that turn.
    pub your_turn: bool,
    /// Full question catalog to select from.
    pub questions: Vec<CatalogQuestion>,
}

/// Selection progress as seen by one recipient.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SelectionView {
    /// Match the selection belongs to.
    pub match_id: Uuid,
    /// How many questions the acting player has picked so far.
    pub selected_count: usize,
    /// Whether the acting player completed their set.
    pub finished_selection: bool,
    /// Who selects next; `None` once the phase closed.
    pub current_turn: Option<Uuid>,
    /// Whether the recipient selects next.
    pub your_turn: bool,
}

/// Result of one recorded answer, sent only to the acting player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnswerView {
    /// Match the answer belongs to.
    pub match_id: Uuid,
    /// Question that was answered.
    pub question_id: u32,
    /// Whether the answer was correct.
    pub is_correct: bool,
    /// Points awarded for this answer.
    pub points: i64,
    /// Acting player's running total.
    pub total_points: i64,
    /// Acting player's running correct count.
    pub correct_answers: u32,
    /// How many of the assigned questions the acting player answered so far.
    pub answered_count: usize,
    /// Whether the acting player answered all assigned questions.
    pub finished_answering: bool,
}

/// Final per-player summary inside the resolution payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerResultSummary {
    /// Stable user identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Final point total.
    pub total_points: i64,
    /// Final count of correct answers.
    pub correct_answers: u32,
}

impl From<&PlayerDuelState> for PlayerResultSummary {
    fn from(player: &PlayerDuelState) -> Self {
        Self {
            id: player.user_id,
            name: player.name.clone(),
            total_points: player.total_points,
            correct_answers: player.correct_answers,
        }
    }
}

/// Resolution payload, tagged per recipient with its own `you_won` flag.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchFinishedPayload {
    /// Identifier of the resolved match.
    pub match_id: Uuid,
    /// Winner profile, absent on a draw.
    pub winner: Option<PlayerProfile>,
    /// Whether the duel ended with equal totals.
    pub is_draw: bool,
    /// Whether the recipient won.
    pub you_won: bool,
    /// Summary of the first participant.
    pub player1: PlayerResultSummary,
    /// Summary of the second participant.
    pub player2: PlayerResultSummary,
}

/// Opponent progress as exposed through the sanitized lobby snapshot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OpponentPublicView {
    /// Stable user identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// How many questions the opponent has selected.
    pub selected_count: usize,
    /// How many assigned questions the opponent has answered.
    pub answered_count: usize,
}

/// Read-only snapshot of a match for one participant.
///
/// Hides the opponent's selection and assignment lists entirely; the
/// requester sees only their own lists and the opponent's public counts.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LobbySnapshot {
    /// Match identifier.
    pub match_id: Uuid,
    /// Current phase label.
    pub phase: String,
    /// Who selects next, during the selection phase.
    pub current_turn: Option<Uuid>,
    /// Whether the requester selects next.
    pub your_turn: bool,
    /// Questions the requester picked for the opponent.
    pub selected_questions: Vec<u32>,
    /// Questions assigned to the requester, populated once answering starts.
    pub assigned_questions: Vec<u32>,
    /// How many assigned questions the requester answered.
    pub answered_count: usize,
    /// Requester's running point total.
    pub total_points: i64,
    /// Opponent progress, public fields only.
    pub opponent: OpponentPublicView,
    /// Winner id, populated once the match finished.
    pub winner_id: Option<Uuid>,
    /// Whether the match resolved as a draw.
    pub is_draw: bool,
    /// RFC3339 creation timestamp.
    pub created_at: String,
}

impl LobbySnapshot {
    /// Build the sanitized snapshot of `record` for `user_id`.
    ///
    /// Returns `None` when the user is not a participant.
    pub fn for_participant(record: &MatchRecord, user_id: Uuid) -> Option<Self> {
        let me = record.participant(user_id)?;
        let opponent = record.opponent_of(user_id)?;

        Some(Self {
            match_id: record.id,
            phase: record.phase.as_str().to_string(),
            current_turn: record.current_turn,
            your_turn: record.current_turn == Some(user_id),
            selected_questions: me.selected_questions.clone(),
            assigned_questions: me.assigned_questions.clone(),
            answered_count: me.answers.len(),
            total_points: me.total_points,
            opponent: OpponentPublicView {
                id: opponent.user_id,
                name: opponent.name.clone(),
                selected_count: opponent.selected_questions.len(),
                answered_count: opponent.answers.len(),
            },
            winner_id: record.winner_id,
            is_draw: record.is_draw,
            created_at: format_system_time(record.created_at),
        })
    }
}

/// Current orchestrator-side status of one user.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusResponse {
    /// One of `offline`, `idle`, `searching`, `in-match`.
    pub status: String,
    /// Live match the user participates in, if any.
    pub match_id: Option<Uuid>,
}

/// Body of the manual `select-question` REST action.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SelectQuestionRequest {
    /// Acting user.
    pub user_id: Uuid,
    /// Question to add to the selection set.
    pub question_id: u32,
}

/// Body of the manual `answer-question` REST action.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AnswerQuestionRequest {
    /// Acting user.
    pub user_id: Uuid,
    /// Question being answered.
    pub question_id: u32,
    /// Option index the user picked.
    pub selected_option: usize,
    /// Client-measured response time in seconds.
    #[validate(range(min = 0.0))]
    pub elapsed_seconds: f64,
}

/// Body of the administrative `leave` REST action.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LeaveRequest {
    /// User abandoning the match.
    pub user_id: Uuid,
}
