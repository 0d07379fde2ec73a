//! REST parallel surface for duel actions and read-only snapshots.
//!
//! These routes apply the same validation and go through the same per-match
//! serialization as the WebSocket path, so clients without a persistent
//! connection can never race it.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::duel::{
        AnswerQuestionRequest, AnswerView, LeaveRequest, LobbySnapshot, SelectQuestionRequest,
        SelectionView, StatusResponse,
    },
    error::AppError,
    services::duel_service,
    state::SharedState,
};

/// Configure the duel REST subtree.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/versus/status/{user_id}", get(player_status))
        .route(
            "/versus/matches/{match_id}/lobby/{user_id}",
            get(lobby_snapshot),
        )
        .route("/versus/matches/{match_id}/select", post(select_question))
        .route("/versus/matches/{match_id}/answer", post(answer_question))
        .route("/versus/matches/{match_id}/leave", post(leave_match))
}

#[utoipa::path(
    get,
    path = "/versus/status/{user_id}",
    tag = "versus",
    params(("user_id" = Uuid, Path, description = "User to report status for")),
    responses((status = 200, description = "Current status", body = StatusResponse))
)]
/// Report whether a user is idle, searching, or inside a match.
pub async fn player_status(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Json<StatusResponse> {
    Json(duel_service::player_status(&state, user_id).await)
}

#[utoipa::path(
    get,
    path = "/versus/matches/{match_id}/lobby/{user_id}",
    tag = "versus",
    params(
        ("match_id" = Uuid, Path, description = "Match to snapshot"),
        ("user_id" = Uuid, Path, description = "Requesting participant"),
    ),
    responses((status = 200, description = "Sanitized match snapshot", body = LobbySnapshot))
)]
/// Read a sanitized snapshot of a match for one participant.
pub async fn lobby_snapshot(
    State(state): State<SharedState>,
    Path((match_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<LobbySnapshot>, AppError> {
    let snapshot = duel_service::lobby_snapshot(&state, match_id, user_id).await?;
    Ok(Json(snapshot))
}

#[utoipa::path(
    post,
    path = "/versus/matches/{match_id}/select",
    tag = "versus",
    params(("match_id" = Uuid, Path, description = "Match the selection targets")),
    request_body = SelectQuestionRequest,
    responses((status = 200, description = "Selection accepted", body = SelectionView))
)]
/// Manual `select-question` action for clients without a persistent connection.
pub async fn select_question(
    State(state): State<SharedState>,
    Path(match_id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<SelectQuestionRequest>>,
) -> Result<Json<SelectionView>, AppError> {
    let view =
        duel_service::select_question(&state, payload.user_id, match_id, payload.question_id)
            .await?;
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/versus/matches/{match_id}/answer",
    tag = "versus",
    params(("match_id" = Uuid, Path, description = "Match the answer targets")),
    request_body = AnswerQuestionRequest,
    responses((status = 200, description = "Answer recorded", body = AnswerView))
)]
/// Manual `answer-question` action for clients without a persistent connection.
pub async fn answer_question(
    State(state): State<SharedState>,
    Path(match_id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<AnswerQuestionRequest>>,
) -> Result<Json<AnswerView>, AppError> {
    let view = duel_service::answer_question(
        &state,
        payload.user_id,
        match_id,
        payload.question_id,
        payload.selected_option,
        payload.elapsed_seconds,
    )
    .await?;
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/versus/matches/{match_id}/leave",
    tag = "versus",
    params(("match_id" = Uuid, Path, description = "Match to leave")),
    request_body = LeaveRequest,
    responses((status = 200, description = "Match abandoned"))
)]
/// Administrative leave: abandons the match exactly like a dropped connection.
pub async fn leave_match(
    State(state): State<SharedState>,
    Path(match_id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<LeaveRequest>>,
) -> Result<(), AppError> {
    duel_service::leave_match(&state, payload.user_id, match_id).await?;
    Ok(())
}
