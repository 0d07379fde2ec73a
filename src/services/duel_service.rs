//! Orchestrator verbs operating on a single duel.
//!
//! Every mutation locks the per-match record first, so actions from both
//! players, the answering deadline, and administrative leaves are linearized
//! per match. Validation happens inside the state machine before any
//! mutation; a rejected action leaves the record untouched.

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::{
        duel::{
            AnswerView, CatalogQuestion, LobbySnapshot, MatchFinishedPayload, PlayerProfile,
            PlayerResultSummary, SelectionView, StatusResponse,
        },
        ws::ServerMessage,
    },
    error::ServiceError,
    services::{timeout, websocket_service::notify_user},
    state::{
        SharedState,
        duel::{AnswerOutcome, DuelPhase, MatchRecord, SelectionOutcome},
    },
};

/// Apply a question selection on behalf of `user_id`.
///
/// On the pick that completes both sets, the phase advances to answering:
/// selections are cross-assigned, each player is notified with their own
/// assigned questions, and the answering deadline is armed.
pub async fn select_question(
    state: &SharedState,
    user_id: Uuid,
    match_id: Uuid,
    question_id: u32,
) -> Result<SelectionView, ServiceError> {
    let handle = state
        .duel(match_id)
        .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}` not found")))?;
    let mut record = handle.record.lock().await;

    let outcome = record.select_question(
        user_id,
        question_id,
        state.catalog(),
        state.config().selection_count,
    )?;

    let acting = record
        .participant(user_id)
        .expect("acting player validated by the state machine");
    let selected_count = acting.selected_questions.len();
    let finished_selection = acting.has_finished_selection;
    let opponent_id = record
        .opponent_of(user_id)
        .expect("acting player validated by the state machine")
        .user_id;

    match outcome {
        SelectionOutcome::TurnPassed(next_turn) => {
            let view = |recipient: Uuid| SelectionView {
                match_id,
                selected_count,
                finished_selection,
                current_turn: Some(next_turn),
                your_turn: next_turn == recipient,
            };
            notify_user(
                state,
                user_id,
                &ServerMessage::QuestionSelected(view(user_id)),
            );
            notify_user(
                state,
                opponent_id,
                &ServerMessage::OpponentSelected(view(opponent_id)),
            );
            Ok(view(user_id))
        }
        SelectionOutcome::SelectionComplete => {
            record.begin_answering();
            notify_answering_started(state, &record);
            timeout::arm_answering_deadline(
                state.clone(),
                match_id,
                state.config().answering_time_limit,
            );
            info!(%match_id, "selection complete; answering phase started");
            Ok(SelectionView {
                match_id,
                selected_count,
                finished_selection,
                current_turn: None,
                your_turn: false,
            })
        }
    }
}

/// Record an answer on behalf of `user_id`.
///
/// The acting side learns correctness and points; the opponent only learns
/// the updated progress count. The match finishes when both players are done
/// or the deadline fires, whichever happens first.
pub async fn answer_question(
    state: &SharedState,
    user_id: Uuid,
    match_id: Uuid,
    question_id: u32,
    selected_option: usize,
    elapsed_seconds: f64,
) -> Result<AnswerView, ServiceError> {
    if !elapsed_seconds.is_finite() || elapsed_seconds < 0.0 {
        return Err(ServiceError::InvalidInput(
            "elapsed seconds must be a non-negative number".into(),
        ));
    }

    let handle = state
        .duel(match_id)
        .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}` not found")))?;
    let mut record = handle.record.lock().await;

    let (answer, outcome) = record.record_answer(
        user_id,
        question_id,
        selected_option,
        elapsed_seconds,
        state.catalog(),
        &state.config().scoring,
    )?;

    let acting = record
        .participant(user_id)
        .expect("acting player validated by the state machine");
    let view = AnswerView {
        match_id,
        question_id,
        is_correct: answer.is_correct,
        points: answer.points,
        total_points: acting.total_points,
        correct_answers: acting.correct_answers,
        answered_count: acting.answers.len(),
        finished_answering: acting.has_finished_answering,
    };
    let opponent_id = record
        .opponent_of(user_id)
        .expect("acting player validated by the state machine")
        .user_id;

    notify_user(
        state,
        user_id,
        &ServerMessage::AnswerRecorded(view.clone()),
    );
    notify_user(
        state,
        opponent_id,
        &ServerMessage::OpponentProgress {
            match_id,
            answered_count: view.answered_count,
        },
    );

    if outcome == AnswerOutcome::AnsweringComplete {
        finalize_match(state, &mut record);
    }

    Ok(view)
}

/// Deadline callback for the answering phase.
///
/// Re-fetches the record and no-ops unless the match is still answering, so
/// a stale timer can never re-finish an already finished match or
/// double-broadcast the resolution.
pub async fn force_finish(state: &SharedState, match_id: Uuid) {
    let Some(handle) = state.duel(match_id) else {
        return;
    };
    let mut record = handle.record.lock().await;
    if record.phase != DuelPhase::Answering {
        debug!(%match_id, phase = record.phase.as_str(), "stale answering deadline ignored");
        return;
    }

    info!(%match_id, "answering deadline elapsed; forcing resolution");
    finalize_match(state, &mut record);
}

/// Administrative leave: same effect on the match as a dropped connection.
pub async fn leave_match(
    state: &SharedState,
    user_id: Uuid,
    match_id: Uuid,
) -> Result<(), ServiceError> {
    let handle = state
        .duel(match_id)
        .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}` not found")))?;
    let mut record = handle.record.lock().await;

    if record.participant(user_id).is_none() {
        return Err(ServiceError::Unauthorized(format!(
            "user `{user_id}` is not a participant of match `{match_id}`"
        )));
    }
    if record.phase == DuelPhase::Finished {
        return Err(ServiceError::InvalidState("match already finished".into()));
    }

    abandon_match(state, &mut record, user_id);
    Ok(())
}

/// Tear down state for a dropped connection.
///
/// Removes the session, clears any queue entry, and abandons a live match
/// with an `opponent-disconnected` notification to the remaining player.
pub async fn handle_disconnect(state: &SharedState, user_id: Uuid) {
    let Some(session) = state.remove_session(user_id) else {
        return;
    };

    {
        let mut queue = state.queue().lock().await;
        queue.remove(user_id);
    }

    if let Some(match_id) = session.current_match_id
        && let Some(handle) = state.duel(match_id)
    {
        let mut record = handle.record.lock().await;
        if record.phase != DuelPhase::Finished {
            abandon_match(state, &mut record, user_id);
        }
    }

    info!(user_id = %user_id, "player disconnected");
}

/// Current orchestrator-side status of a user.
pub async fn player_status(state: &SharedState, user_id: Uuid) -> StatusResponse {
    if let Some(session) = state.session(user_id) {
        if let Some(match_id) = session.current_match_id {
            return StatusResponse {
                status: "in-match".into(),
                match_id: Some(match_id),
            };
        }
        if session.is_searching {
            return StatusResponse {
                status: "searching".into(),
                match_id: None,
            };
        }
        return StatusResponse {
            status: "idle".into(),
            match_id: None,
        };
    }

    // REST-only participants have no session but may still be in a match.
    if let Some(match_id) = state.find_match_of(user_id).await {
        return StatusResponse {
            status: "in-match".into(),
            match_id: Some(match_id),
        };
    }

    StatusResponse {
        status: "offline".into(),
        match_id: None,
    }
}

/// Sanitized read-only view of a match for one participant.
pub async fn lobby_snapshot(
    state: &SharedState,
    match_id: Uuid,
    user_id: Uuid,
) -> Result<LobbySnapshot, ServiceError> {
    let handle = state
        .duel(match_id)
        .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}` not found")))?;
    let record = handle.record.lock().await;

    LobbySnapshot::for_participant(&record, user_id).ok_or_else(|| {
        ServiceError::Unauthorized(format!(
            "user `{user_id}` is not a participant of match `{match_id}`"
        ))
    })
}

/// Notify each participant with their own assigned questions.
///
/// The assigned set is exactly the opponent's picks, revealed only now.
fn notify_answering_started(state: &SharedState, record: &MatchRecord) {
    let time_limit_seconds = state.config().answering_time_limit_seconds();
    for player in [&record.player1, &record.player2] {
        let questions: Vec<CatalogQuestion> = player
            .assigned_questions
            .iter()
            .filter_map(|id| state.catalog().get(*id))
            .map(Into::into)
            .collect();
        notify_user(
            state,
            player.user_id,
            &ServerMessage::AnsweringPhaseStart {
                match_id: record.id,
                questions,
                time_limit_seconds,
            },
        );
    }
}

/// Resolve the match, broadcast the result to both sides, and schedule the
/// record's removal after the grace window.
fn finalize_match(state: &SharedState, record: &mut MatchRecord) {
    let resolution = record.finish();
    let match_id = record.id;

    let winner = resolution.winner_id.and_then(|id| {
        record.participant(id).map(|player| PlayerProfile {
            id: player.user_id,
            name: player.name.clone(),
        })
    });
    let player1 = PlayerResultSummary::from(&record.player1);
    let player2 = PlayerResultSummary::from(&record.player2);

    // Integration point for downstream ranking persistence.
    info!(
        %match_id,
        winner = ?resolution.winner_id,
        is_draw = resolution.is_draw,
        player1_points = player1.total_points,
        player2_points = player2.total_points,
        "duel finished"
    );

    for recipient in [player1.id, player2.id] {
        notify_user(
            state,
            recipient,
            &ServerMessage::MatchFinished(MatchFinishedPayload {
                match_id,
                winner: winner.clone(),
                is_draw: resolution.is_draw,
                you_won: resolution.winner_id == Some(recipient),
                player1: player1.clone(),
                player2: player2.clone(),
            }),
        );
        state.update_session(recipient, |session| session.current_match_id = None);
    }

    timeout::schedule_removal(state.clone(), match_id, state.config().finished_grace);
}

/// Abandon a live match: notify the remaining player, clear both sessions,
/// and discard the record immediately.
fn abandon_match(state: &SharedState, record: &mut MatchRecord, leaver: Uuid) {
    record.abandon();
    let match_id = record.id;
    let (player1, player2) = record.participant_ids();

    if let Some(opponent) = record.opponent_of(leaver) {
        notify_user(
            state,
            opponent.user_id,
            &ServerMessage::OpponentDisconnected { match_id },
        );
    }

    for participant in [player1, player2] {
        state.update_session(participant, |session| session.current_match_id = None);
    }

    state.remove_duel(match_id);
    info!(%match_id, leaver = %leaver, "match abandoned");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::QuestionCatalog,
        config::AppConfig,
        services::matchmaking,
        state::{AppState, session::PlayerSession},
    };
    use axum::extract::ws::Message;
    use tokio::sync::mpsc;

    fn test_state() -> SharedState {
        AppState::new(AppConfig::default(), QuestionCatalog::default())
    }

    fn connect(state: &SharedState, name: &str) -> (Uuid, mpsc::UnboundedReceiver<Message>) {
        let user_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        state
            .register_session(PlayerSession::new(user_id, name.into(), tx))
            .unwrap();
        (user_id, rx)
    }

    async fn paired(
        state: &SharedState,
    ) -> (
        Uuid,
        Uuid,
        Uuid,
        mpsc::UnboundedReceiver<Message>,
        mpsc::UnboundedReceiver<Message>,
    ) {
        let (alice, alice_rx) = connect(state, "Alice");
        let (bob, bob_rx) = connect(state, "Bob");
        matchmaking::search_match(state, alice).await.unwrap();
        matchmaking::search_match(state, bob).await.unwrap();
        let match_id = state.session(alice).unwrap().current_match_id.unwrap();
        (alice, bob, match_id, alice_rx, bob_rx)
    }

    async fn run_selection(state: &SharedState, match_id: Uuid, alice: Uuid, bob: Uuid) {
        // Force a deterministic starting turn for the scripted picks.
        {
            let handle = state.duel(match_id).unwrap();
            let mut record = handle.record.lock().await;
            record.current_turn = Some(alice);
        }
        for round in 0..5u32 {
            select_question(state, alice, match_id, round + 1)
                .await
                .unwrap();
            select_question(state, bob, match_id, round + 6)
                .await
                .unwrap();
        }
    }

    fn drain_types(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<String> {
        let mut types = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            types.push(value["type"].as_str().unwrap_or_default().to_string());
        }
        types
    }

    #[tokio::test]
    async fn selection_completion_starts_answering_with_cross_assignment() {
        let state = test_state();
        let (alice, bob, match_id, mut alice_rx, mut bob_rx) = paired(&state).await;
        run_selection(&state, match_id, alice, bob).await;

        let handle = state.duel(match_id).unwrap();
        let record = handle.record.lock().await;
        assert_eq!(record.phase, DuelPhase::Answering);
        let alice_state = record.participant(alice).unwrap();
        let bob_state = record.participant(bob).unwrap();
        assert_eq!(alice_state.assigned_questions, vec![6, 7, 8, 9, 10]);
        assert_eq!(bob_state.assigned_questions, vec![1, 2, 3, 4, 5]);
        assert_eq!(alice_state.assigned_questions, bob_state.selected_questions);
        drop(record);

        let alice_events = drain_types(&mut alice_rx);
        let bob_events = drain_types(&mut bob_rx);
        assert!(alice_events.contains(&"answering-phase-start".to_string()));
        assert!(bob_events.contains(&"answering-phase-start".to_string()));
    }

    #[tokio::test]
    async fn unknown_match_is_rejected() {
        let state = test_state();
        let (alice, _rx) = connect(&state, "Alice");
        let err = select_question(&state, alice, Uuid::new_v4(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn both_finished_resolves_and_notifies_each_side() {
        let state = test_state();
        let (alice, bob, match_id, mut alice_rx, mut bob_rx) = paired(&state).await;
        run_selection(&state, match_id, alice, bob).await;

        let catalog = QuestionCatalog::default();
        for id in [6u32, 7, 8, 9, 10] {
            let correct = catalog.get(id).unwrap().correct_option;
            answer_question(&state, alice, match_id, id, correct, 1.0)
                .await
                .unwrap();
        }
        for id in [1u32, 2, 3, 4, 5] {
            let correct = catalog.get(id).unwrap().correct_option;
            let wrong = (correct + 1) % catalog.get(id).unwrap().options.len();
            answer_question(&state, bob, match_id, id, wrong, 1.0)
                .await
                .unwrap();
        }

        let handle = state.duel(match_id).unwrap();
        let record = handle.record.lock().await;
        assert_eq!(record.phase, DuelPhase::Finished);
        assert_eq!(record.winner_id, Some(alice));
        assert!(!record.is_draw);
        drop(record);

        // Sessions leave the match at resolution; the record stays readable
        // until the grace window expires.
        assert!(state.session(alice).unwrap().current_match_id.is_none());
        assert!(state.session(bob).unwrap().current_match_id.is_none());
        assert!(state.duel(match_id).is_some());

        assert!(
            drain_types(&mut alice_rx).contains(&"match-finished".to_string())
        );
        assert!(drain_types(&mut bob_rx).contains(&"match-finished".to_string()));
    }

    #[tokio::test]
    async fn force_finish_is_stale_safe() {
        let state = test_state();
        let (alice, bob, match_id, _alice_rx, mut bob_rx) = paired(&state).await;
        run_selection(&state, match_id, alice, bob).await;

        // Only Alice answers; the deadline resolves with partial totals.
        let catalog = QuestionCatalog::default();
        for id in [6u32, 7, 8, 9, 10] {
            let correct = catalog.get(id).unwrap().correct_option;
            answer_question(&state, alice, match_id, id, correct, 1.0)
                .await
                .unwrap();
        }

        force_finish(&state, match_id).await;
        {
            let handle = state.duel(match_id).unwrap();
            let record = handle.record.lock().await;
            assert_eq!(record.phase, DuelPhase::Finished);
            assert_eq!(record.winner_id, Some(alice));
        }

        // A second firing must not double-broadcast.
        let before = drain_types(&mut bob_rx);
        force_finish(&state, match_id).await;
        assert!(drain_types(&mut bob_rx).is_empty());
        assert_eq!(
            before
                .iter()
                .filter(|kind| kind.as_str() == "match-finished")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn answer_after_finish_is_rejected() {
        let state = test_state();
        let (alice, bob, match_id, _alice_rx, _bob_rx) = paired(&state).await;
        run_selection(&state, match_id, alice, bob).await;
        force_finish(&state, match_id).await;

        let err = answer_question(&state, alice, match_id, 6, 0, 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn disconnect_mid_match_notifies_opponent_and_discards_record() {
        let state = test_state();
        let (alice, bob, match_id, mut alice_rx, _bob_rx) = paired(&state).await;
        run_selection(&state, match_id, alice, bob).await;

        handle_disconnect(&state, bob).await;

        assert!(state.duel(match_id).is_none());
        assert!(state.session(bob).is_none());
        assert!(state.session(alice).unwrap().current_match_id.is_none());
        assert!(
            drain_types(&mut alice_rx).contains(&"opponent-disconnected".to_string())
        );

        // Late action against the discarded match is an unknown-match error.
        let err = answer_question(&state, alice, match_id, 6, 0, 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn disconnect_while_searching_dequeues() {
        let state = test_state();
        let (alice, _rx) = connect(&state, "Alice");
        matchmaking::search_match(&state, alice).await.unwrap();

        handle_disconnect(&state, alice).await;

        assert!(!state.queue().lock().await.contains(alice));
        assert!(state.session(alice).is_none());
    }

    #[tokio::test]
    async fn lobby_snapshot_hides_opponent_lists() {
        let state = test_state();
        let (alice, bob, match_id, _alice_rx, _bob_rx) = paired(&state).await;
        run_selection(&state, match_id, alice, bob).await;

        let snapshot = lobby_snapshot(&state, match_id, alice).await.unwrap();
        assert_eq!(snapshot.phase, "answering");
        assert_eq!(snapshot.assigned_questions, vec![6, 7, 8, 9, 10]);
        assert_eq!(snapshot.opponent.id, bob);
        assert_eq!(snapshot.opponent.selected_count, 5);

        let err = lobby_snapshot(&state, match_id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn status_reflects_lifecycle() {
        let state = test_state();
        let (alice, _rx) = connect(&state, "Alice");
        assert_eq!(player_status(&state, alice).await.status, "idle");

        matchmaking::search_match(&state, alice).await.unwrap();
        assert_eq!(player_status(&state, alice).await.status, "searching");

        assert_eq!(
            player_status(&state, Uuid::new_v4()).await.status,
            "offline"
        );
    }

    #[tokio::test]
    async fn leave_match_abandons_for_both_sides() {
        let state = test_state();
        let (alice, bob, match_id, _alice_rx, mut bob_rx) = paired(&state).await;

        leave_match(&state, alice, match_id).await.unwrap();

        assert!(state.duel(match_id).is_none());
        assert!(state.session(alice).unwrap().current_match_id.is_none());
        assert!(state.session(bob).unwrap().current_match_id.is_none());
        assert!(
            drain_types(&mut bob_rx).contains(&"opponent-disconnected".to_string())
        );
    }
}
