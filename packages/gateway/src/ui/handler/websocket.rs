//! WebSocket session handling.
//!
//! A session is anonymous until its first `register` event. After that every
//! event it sends is attributed to the registered user id.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use carelink_shared::protocol::{ClientEvent, ErrorNotice, RegisteredAck, ServerEvent};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use crate::{
    domain::{SessionId, UserId},
    ui::state::AppState,
};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Spawns a task that drains `rx` into the WebSocket sink.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

fn send_event(tx: &mpsc::UnboundedSender<String>, event: &ServerEvent) {
    match event.to_json() {
        Ok(json) => {
            if tx.send(json).is_err() {
                tracing::debug!("Session closed before '{}' could be sent", event.name());
            }
        }
        Err(e) => tracing::error!("Failed to encode '{}': {}", event.name(), e),
    }
}

fn send_error(tx: &mpsc::UnboundedSender<String>, message: impl Into<String>) {
    send_event(
        tx,
        &ServerEvent::Error(ErrorNotice {
            message: message.into(),
        }),
    );
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = SessionId::generate();
    let (sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<String>();

    tracing::info!("Session '{}' opened", session_id);

    let state_for_recv = state.clone();
    let session_for_recv = session_id.clone();
    let mut recv_task = tokio::spawn(async move {
        let mut registered: Option<UserId> = None;

        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on '{}': {}", session_for_recv, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => match ClientEvent::from_json(&text) {
                    Ok(event) => {
                        handle_event(
                            &state_for_recv,
                            &session_for_recv,
                            &tx,
                            &mut registered,
                            event,
                        )
                        .await;
                    }
                    Err(e) => {
                        tracing::warn!("Malformed event on '{}': {}", session_for_recv, e);
                        send_error(&tx, format!("malformed event: {}", e));
                    }
                },
                Message::Close(_) => {
                    tracing::info!("Session '{}' requested close", session_for_recv);
                    break;
                }
                _ => {}
            }
        }
    });

    let mut send_task = pusher_loop(rx, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    match state
        .disconnect_session_usecase
        .execute(&session_id)
        .await
    {
        Some((user_id, remaining)) => tracing::info!(
            "Session '{}' of '{}' closed ({} remaining)",
            session_id,
            user_id,
            remaining
        ),
        None => tracing::info!("Unregistered session '{}' closed", session_id),
    }
}

async fn handle_event(
    state: &AppState,
    session_id: &SessionId,
    tx: &mpsc::UnboundedSender<String>,
    registered: &mut Option<UserId>,
    event: ClientEvent,
) {
    let current = registered.clone();

    match (event, current) {
        (ClientEvent::Register(raw_user_id), None) => {
            match state
                .register_session_usecase
                .execute(raw_user_id, session_id.clone(), tx.clone())
                .await
            {
                Ok((user_id, sessions)) => {
                    tracing::info!(
                        "Session '{}' registered as '{}' ({} session(s))",
                        session_id,
                        user_id,
                        sessions
                    );
                    send_event(
                        tx,
                        &ServerEvent::Registered(RegisteredAck {
                            user_id: user_id.as_str().to_string(),
                        }),
                    );
                    *registered = Some(user_id);
                }
                Err(e) => {
                    tracing::warn!("Rejected register on '{}': {}", session_id, e);
                    send_error(tx, e.to_string());
                }
            }
        }
        (ClientEvent::Register(raw_user_id), Some(user_id)) => {
            tracing::warn!(
                "Session '{}' tried to re-register as '{}' (already '{}')",
                session_id,
                raw_user_id,
                user_id
            );
            send_error(tx, format!("session already registered as '{}'", user_id));
        }
        (_, None) => {
            send_error(tx, "register before sending events");
        }
        (ClientEvent::SendMessage(outgoing), Some(user_id)) => {
            if let Err(e) = state
                .relay_message_usecase
                .execute(&user_id, outgoing)
                .await
            {
                tracing::warn!("Failed to relay message from '{}': {}", user_id, e);
                send_error(tx, e.to_string());
            }
        }
        (ClientEvent::MarkRead(marker), Some(user_id)) => {
            if let Err(e) = state.relay_read_usecase.execute(&user_id, marker).await {
                tracing::warn!("Failed to relay read marker from '{}': {}", user_id, e);
                send_error(tx, e.to_string());
            }
        }
        (ClientEvent::DeleteMessage(request), Some(user_id)) => {
            if let Err(e) = state
                .delete_message_usecase
                .execute(&user_id, request)
                .await
            {
                tracing::warn!("Rejected delete from '{}': {}", user_id, e);
                send_error(tx, e.to_string());
            }
        }
    }
}
