//! Queue admission and opportunistic pairing.

use rand::Rng;
use tracing::info;
use uuid::Uuid;

use crate::{
    dto::{
        duel::{CatalogQuestion, MatchFoundPayload, PlayerProfile},
        ws::ServerMessage,
    },
    error::ServiceError,
    services::websocket_service::notify_user,
    state::{SharedState, duel::MatchRecord, queue::MatchQueue},
};

/// Enqueue the caller and attempt a pairing right away.
///
/// The whole attempt runs under the queue lock, so two concurrent searches
/// can never commit the same candidate twice.
pub async fn search_match(state: &SharedState, user_id: Uuid) -> Result<(), ServiceError> {
    let mut queue = state.queue().lock().await;

    // Validated under the queue lock: pairing commits only happen under this
    // lock, so the check cannot race one.
    let session = state
        .session(user_id)
        .ok_or_else(|| ServiceError::NotFound(format!("no session for user `{user_id}`")))?;
    if session.current_match_id.is_some() {
        return Err(ServiceError::InvalidState(
            "cannot search for a match while already in one".into(),
        ));
    }

    queue.enqueue(user_id);
    state.update_session(user_id, |session| session.is_searching = true);
    notify_user(state, user_id, &ServerMessage::Searching);

    try_pair(state, &mut queue, user_id);
    Ok(())
}

/// Remove the caller from the queue and acknowledge the cancellation.
pub async fn cancel_search(state: &SharedState, user_id: Uuid) -> Result<(), ServiceError> {
    if state.session(user_id).is_none() {
        return Err(ServiceError::NotFound(format!(
            "no session for user `{user_id}`"
        )));
    }

    let mut queue = state.queue().lock().await;
    queue.remove(user_id);
    drop(queue);

    state.update_session(user_id, |session| session.is_searching = false);
    notify_user(state, user_id, &ServerMessage::SearchCancelled);
    Ok(())
}

/// Pair `user_id` with the earliest valid candidate, if any.
///
/// Candidates are re-validated against the registry before committing: a
/// queue entry can outlive its session when a disconnect races the pairing
/// attempt, and such stale entries are simply dropped.
fn try_pair(state: &SharedState, queue: &mut MatchQueue, user_id: Uuid) {
    while let Some(candidate) = queue.dequeue_candidate_excluding(user_id) {
        // The enqueuer itself may have disconnected while we held the lock.
        let Some(me) = state.session(user_id) else {
            break;
        };
        if !me.is_searching || me.current_match_id.is_some() {
            break;
        }

        let Some(opponent) = state.session(candidate) else {
            continue;
        };
        if !opponent.is_searching || opponent.current_match_id.is_some() {
            continue;
        }

        queue.remove(user_id);

        let first_turn = if rand::rng().random_bool(0.5) {
            user_id
        } else {
            candidate
        };
        let record = MatchRecord::new(me.profile(), opponent.profile(), first_turn);
        let match_id = record.id;

        state.update_session(user_id, |session| {
            session.is_searching = false;
            session.current_match_id = Some(match_id);
        });
        state.update_session(candidate, |session| {
            session.is_searching = false;
            session.current_match_id = Some(match_id);
        });

        // The record must be in the store before either client learns the
        // match id, or an eager first selection could miss it.
        state.insert_duel(record);

        let questions: Vec<CatalogQuestion> = state.catalog().iter().map(Into::into).collect();
        let notify_found = |recipient: Uuid, opponent_profile: PlayerProfile| {
            notify_user(
                state,
                recipient,
                &ServerMessage::MatchFound(MatchFoundPayload {
                    match_id,
                    opponent: opponent_profile,
                    current_turn: first_turn,
                    your_turn: first_turn == recipient,
                    questions: questions.clone(),
                }),
            );
        };
        notify_found(
            user_id,
            PlayerProfile {
                id: opponent.user_id,
                name: opponent.name.clone(),
            },
        );
        notify_found(
            candidate,
            PlayerProfile {
                id: me.user_id,
                name: me.name.clone(),
            },
        );

        info!(
            %match_id,
            player1 = %user_id,
            player2 = %candidate,
            first_turn = %first_turn,
            "duel paired"
        );
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::QuestionCatalog,
        config::AppConfig,
        state::{AppState, session::PlayerSession},
    };
    use axum::extract::ws::Message;
    use tokio::sync::mpsc;

    fn test_state() -> SharedState {
        AppState::new(AppConfig::default(), QuestionCatalog::default())
    }

    fn connect(
        state: &SharedState,
        name: &str,
    ) -> (Uuid, mpsc::UnboundedReceiver<Message>) {
        let user_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        state
            .register_session(PlayerSession::new(user_id, name.into(), tx))
            .unwrap();
        (user_id, rx)
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
    async fn lone_searcher_stays_queued() {
        let state = test_state();
        let (alice, mut rx) = connect(&state, "Alice");

        search_match(&state, alice).await.unwrap();

        assert!(state.queue().lock().await.contains(alice));
        assert!(state.session(alice).unwrap().is_searching);
        assert_eq!(drain_types(&mut rx), vec!["searching"]);
    }

    #[tokio::test]
    async fn two_searchers_are_paired_fifo() {
        let state = test_state();
        let (alice, mut alice_rx) = connect(&state, "Alice");
        let (bob, mut bob_rx) = connect(&state, "Bob");

        search_match(&state, alice).await.unwrap();
        search_match(&state, bob).await.unwrap();

        let alice_session = state.session(alice).unwrap();
        let bob_session = state.session(bob).unwrap();
        assert!(!alice_session.is_searching);
        assert!(!bob_session.is_searching);
        assert_eq!(alice_session.current_match_id, bob_session.current_match_id);
        let match_id = alice_session.current_match_id.unwrap();
        assert!(state.duel(match_id).is_some());
        assert!(state.queue().lock().await.is_empty());

        assert_eq!(drain_types(&mut alice_rx), vec!["searching", "match-found"]);
        assert_eq!(drain_types(&mut bob_rx), vec!["searching", "match-found"]);
    }

    #[tokio::test]
    async fn stale_queue_entry_is_skipped() {
        let state = test_state();
        let (alice, _alice_rx) = connect(&state, "Alice");
        let (bob, _bob_rx) = connect(&state, "Bob");
        let (carol, _carol_rx) = connect(&state, "Carol");

        search_match(&state, alice).await.unwrap();
        // Alice vanishes without her queue entry being cleaned up yet.
        state.remove_session(alice);

        search_match(&state, bob).await.unwrap();
        assert!(state.session(bob).unwrap().current_match_id.is_none());

        // Bob is still searchable and pairs with the next arrival.
        search_match(&state, carol).await.unwrap();
        assert!(state.session(bob).unwrap().current_match_id.is_some());
        assert_eq!(
            state.session(bob).unwrap().current_match_id,
            state.session(carol).unwrap().current_match_id
        );
    }

    #[tokio::test]
    async fn cancel_search_dequeues() {
        let state = test_state();
        let (alice, mut rx) = connect(&state, "Alice");

        search_match(&state, alice).await.unwrap();
        cancel_search(&state, alice).await.unwrap();

        assert!(!state.queue().lock().await.contains(alice));
        assert!(!state.session(alice).unwrap().is_searching);
        assert_eq!(drain_types(&mut rx), vec!["searching", "search-cancelled"]);
    }

    #[tokio::test]
    async fn searching_while_in_match_is_rejected() {
        let state = test_state();
        let (alice, _alice_rx) = connect(&state, "Alice");
        let (bob, _bob_rx) = connect(&state, "Bob");

        search_match(&state, alice).await.unwrap();
        search_match(&state, bob).await.unwrap();

        let err = search_match(&state, alice).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn search_without_session_is_rejected() {
        let state = test_state();
        let err = search_match(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
