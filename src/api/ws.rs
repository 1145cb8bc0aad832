//! Progress channel endpoint (GET /ws/{client_id})
//!
//! A client opens one WebSocket keyed by its self-chosen client id; every
//! download job it starts reports progress here. The socket is outbound-only
//! in practice: inbound frames carry no protocol and are consumed purely as
//! a liveness signal, so the receive loop doubles as the disconnect detector.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;

use super::state::AppState;
use crate::channels::ChannelRegistry;

/// HTTP handler that upgrades the connection to WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, client_id, state.registry))
}

/// Manage a single progress connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the client id, replacing any prior channel for it.
///   2. Spawns a sender task that serializes events from the registry
///      channel into the sink.
///   3. Drains inbound frames on the current task until close or error.
///   4. Unregisters (epoch-guarded, so a superseded connection closing late
///      cannot evict a newer registration) and aborts the sender task.
async fn handle_socket(socket: WebSocket, client_id: String, registry: Arc<ChannelRegistry>) {
    let (epoch, mut rx) = registry.register(client_id.clone()).await;
    tracing::info!(client_id = %client_id, epoch, "Progress channel connected");

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel events to the WebSocket sink. Ends when
    // the registry drops our sender (replacement or shutdown) or the sink
    // breaks; either way the events simply stop flowing.
    let sender_client_id = client_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!(client_id = %sender_client_id, error = %e, "Failed to serialize event");
                    continue;
                }
            };
            if sink.send(Message::Text(payload.into())).await.is_err() {
                tracing::debug!(client_id = %sender_client_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Receiver loop: no inbound protocol, just liveness.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_msg) => {}
            Err(e) => {
                tracing::debug!(client_id = %client_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    registry.unregister(&client_id, epoch).await;
    send_task.abort();
    tracing::info!(client_id = %client_id, epoch, "Progress channel disconnected");
}
