pub mod handlers;
mod participant;
mod presenter;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{ConnectionId, Role};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub role: Option<String>,
}

/// Identity of one live socket as seen by the dispatch layer
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub role: Role,
}

impl Connection {
    pub fn new(role: Role) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            role,
        }
    }
}

/// Whether this connection must hang up after forwarding `msg`.
///
/// Only a student socket that joined under the kicked name is closed; the
/// name is remembered per socket because the kick already removed it from presence.
pub fn closes_on(msg: &ServerMessage, conn: &Connection, joined_name: Option<&str>) -> bool {
    match msg {
        ServerMessage::KickStudent { student_name } => {
            conn.role == Role::Student && joined_name == Some(student_name.as_str())
        }
        _ => false,
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let role = match params.role.as_deref() {
        Some("teacher") => Role::Teacher,
        _ => Role::Student,
    };
    tracing::info!("WebSocket connection request: role={:?}", role);

    ws.on_upgrade(move |socket| handle_socket(socket, Connection::new(role), state))
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            true
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, conn: Connection, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    tracing::info!("WebSocket {} connected with role: {:?}", conn.id, conn.role);

    // Subscribe before the snapshot so nothing emitted in between is missed
    let mut broadcast_rx = state.broadcast.subscribe();

    // Late joiners get the current poll and who is here
    for msg in &state.session_snapshot().await {
        if !send_message(&mut sender, msg).await {
            tracing::error!("Failed to send session snapshot to {}", conn.id);
            return;
        }
    }

    let mut joined_name: Option<String> = None;

    loop {
        tokio::select! {
            broadcast_msg = broadcast_rx.recv() => {
                let msg = match broadcast_msg {
                    Ok(msg) => msg,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Connection {} lagged, skipped {} messages", conn.id, skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                if !send_message(&mut sender, &msg).await {
                    break;
                }

                if closes_on(&msg, &conn, joined_name.as_deref()) {
                    tracing::info!("Closing kicked connection {}", conn.id);
                    let _ = sender
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::POLICY,
                            reason: "kicked".into(),
                        })))
                        .await;
                    break;
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message from {}: {}", conn.id, text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                let joining = matches!(client_msg, ClientMessage::JoinSession { .. });
                                let response = handlers::handle_message(client_msg, &conn, &state).await;

                                if joining {
                                    if let Some(name) = state.participant_name(&conn.id).await {
                                        joined_name = Some(name);
                                    }
                                }

                                if let Some(response) = response {
                                    if !send_message(&mut sender, &response).await {
                                        tracing::error!("Failed to send response");
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::info!("Failed to parse client message: {}", e);
                                let error = ServerMessage::error(
                                    "PARSE_ERROR",
                                    format!("Invalid message format: {}", e),
                                );
                                let _ = send_message(&mut sender, &error).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket {} closed", conn.id);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.disconnect(&conn.id).await;
    tracing::info!("WebSocket connection {} closed for role: {:?}", conn.id, conn.role);
}
