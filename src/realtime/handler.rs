use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    auth::{validate_session, Session},
    realtime::types::{ClientMessage, ServerMessage},
    state::AppState,
};

/// WebSocket upgrade handler. The transport is accepted untrusted; identity
/// is established by the first message, not by a header.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one connection through its lifecycle: wait for authentication
/// within the grace period, register with the hub, then relay subscribe
/// requests until the peer goes away.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let session = match await_authentication(&mut receiver, &state).await {
        Ok(session) => session,
        Err(reason) => {
            tracing::debug!("WebSocket rejected before authentication: {}", reason);
            let reply = ServerMessage::Error { message: reason };
            if let Ok(json) = serde_json::to_string(&reply) {
                let _ = sender.send(Message::Text(json)).await;
            }
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    let connection_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state
        .hub
        .register(connection_id, session.user_id, session.role, tx.clone());

    // Writer task: everything the hub (or the reader below) queues goes out
    // on this connection's own channel.
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    let hub = state.hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Subscribe { topics }) => {
                        hub.subscribe(connection_id, topics);
                    }
                    Ok(ClientMessage::Authenticate { .. }) => {
                        // Already authenticated; ignore.
                    }
                    Err(e) => {
                        let _ = tx.send(ServerMessage::Error {
                            message: format!("Invalid message format: {e}"),
                        });
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.hub.unregister(connection_id);
    tracing::info!("WebSocket connection closed for user {}", session.user_id);
}

/// Wait for the `authenticate` message and validate its credential. The
/// connection gets a short grace period; silence or a bad first message
/// closes it without ever touching the hub.
async fn await_authentication(
    receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
) -> Result<Session, String> {
    let grace = std::time::Duration::from_secs(state.config.ws_auth_grace_secs);

    let first = tokio::time::timeout(grace, receiver.next())
        .await
        .map_err(|_| "Authentication timed out".to_string())?;

    let text = match first {
        Some(Ok(Message::Text(text))) => text,
        _ => return Err("Expected an authenticate message".to_string()),
    };

    match serde_json::from_str::<ClientMessage>(&text) {
        Ok(ClientMessage::Authenticate { token }) => {
            validate_session(&token, &state.config.jwt_secret)
                .map_err(|_| "Invalid credentials".to_string())
        }
        _ => Err("Expected an authenticate message".to_string()),
    }
}
