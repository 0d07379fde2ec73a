//! WebSocket connection lifecycle and inbound message dispatch.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        duel::PlayerProfile,
        ws::{ClientMessage, ServerMessage},
    },
    error::ServiceError,
    services::{duel_service, matchmaking},
    state::{SharedState, session::PlayerSession},
};

/// How long a fresh connection may take to send its identification frame.
const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle for an individual duel WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let inbound = match ClientMessage::from_json_str(&initial_message) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "failed to parse identification message");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let ClientMessage::Identify { user_id, name } = inbound else {
        warn!("first message was not an identification");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    let name = name.trim().to_string();
    if name.is_empty() {
        send_to_tx(
            &outbound_tx,
            &ServerMessage::Error {
                message: "display name must not be empty".into(),
            },
        );
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }

    // A second connection for the same identity is rejected, never silently
    // overwritten; the earlier connection keeps its session.
    let session = PlayerSession::new(user_id, name.clone(), outbound_tx.clone());
    if let Err(err) = state.register_session(session) {
        warn!(user_id = %user_id, error = %err, "rejecting duplicate connection");
        send_to_tx(
            &outbound_tx,
            &ServerMessage::Error {
                message: err.to_string(),
            },
        );
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }

    info!(user_id = %user_id, name = %name, "player connected");
    send_to_tx(
        &outbound_tx,
        &ServerMessage::Connected {
            profile: PlayerProfile { id: user_id, name },
        },
    );

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                dispatch(&state, user_id, &text, &outbound_tx).await;
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(user_id = %user_id, "player closed connection");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "websocket error");
                break;
            }
        }
    }

    duel_service::handle_disconnect(&state, user_id).await;
    finalize(writer_task, outbound_tx).await;
}

/// Parse one inbound frame and route it to the matching service operation.
///
/// Rejections are reported back on the same connection as an `error` event;
/// the connection always stays open.
async fn dispatch(
    state: &SharedState,
    user_id: Uuid,
    text: &str,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) {
    let message = match ClientMessage::from_json_str(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(user_id = %user_id, error = %err, "failed to parse client message");
            send_to_tx(
                outbound_tx,
                &ServerMessage::Error {
                    message: format!("malformed message: {err}"),
                },
            );
            return;
        }
    };

    let result: Result<(), ServiceError> = match message {
        ClientMessage::Identify { .. } => {
            warn!(user_id = %user_id, "ignoring duplicate identification message");
            Ok(())
        }
        ClientMessage::SearchMatch => matchmaking::search_match(state, user_id).await,
        ClientMessage::CancelSearch => matchmaking::cancel_search(state, user_id).await,
        ClientMessage::SelectQuestion {
            match_id,
            question_id,
        } => duel_service::select_question(state, user_id, match_id, question_id)
            .await
            .map(|_| ()),
        ClientMessage::AnswerQuestion {
            match_id,
            question_id,
            selected_option,
            elapsed_seconds,
        } => duel_service::answer_question(
            state,
            user_id,
            match_id,
            question_id,
            selected_option,
            elapsed_seconds,
        )
        .await
        .map(|_| ()),
        ClientMessage::Unknown => Err(ServiceError::InvalidInput(
            "unknown message type".into(),
        )),
    };

    if let Err(err) = result {
        warn!(user_id = %user_id, error = %err, "rejected client action");
        send_to_tx(
            outbound_tx,
            &ServerMessage::Error {
                message: err.to_string(),
            },
        );
    }
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failure is a permanent error (bug in code) and is only
/// logged; a closed writer means the peer is gone and the disconnect path
/// will clean up shortly.
pub fn send_to_tx(tx: &mpsc::UnboundedSender<Message>, message: &ServerMessage) {
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize server message `{message:?}`");
            return;
        }
    };

    let _ = tx.send(Message::Text(payload.into()));
}

/// Push a message to a user's live connection, if one exists.
///
/// Users acting through the REST surface may have no connection; their
/// notifications are simply skipped.
pub fn notify_user(state: &SharedState, user_id: Uuid, message: &ServerMessage) {
    if let Some(session) = state.session(user_id) {
        send_to_tx(&session.tx, message);
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
