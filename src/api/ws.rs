// =============================================================================
// WebSocket Handler — per-client subscription feed
// =============================================================================
//
// Browsers connect to `/ws` and send subscribe requests:
//
//   { "type": "subscribe", "mints": ["<mint>", ...] }
//
// From then on every enrichment cycle for a subscribed mint lands here as a
// ready-serialised `coinUpdate` frame. Each connection gets:
//   - A fresh client id and an unbounded outbound queue registered with the
//     broker; the broker fans out into that queue.
//   - A single task that both drains the queue into the socket and processes
//     incoming frames, via `tokio::select!`.
//   - Cleanup on any exit path: the broker drops the client and unsubscribes
//     upstream mints nobody else watches.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::types::ClientMessage;

// =============================================================================
// WebSocket upgrade handler
// =============================================================================

/// Axum handler for the WebSocket upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

// =============================================================================
// Connection handler
// =============================================================================

/// Manages a single WebSocket connection lifecycle.
///
/// Runs one `tokio::select!` loop over two sources:
///   1. **Push** — coin updates queued by the broker for this client.
///   2. **Recv** — incoming client frames (subscribe requests, Ping, Close).
async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    let client_id = Uuid::new_v4();
    let (tx, mut updates) = mpsc::unbounded_channel::<String>();
    state.broker.register_client(client_id, tx);

    let (mut sender, mut receiver) = socket.split();
    use futures_util::{SinkExt, StreamExt};

    loop {
        tokio::select! {
            // ── Push: forward queued coin updates ───────────────────────
            update = updates.recv() => {
                match update {
                    Some(payload) => {
                        if let Err(e) = sender.send(Message::Text(payload)).await {
                            debug!(client = %client_id, error = %e, "WebSocket send failed, disconnecting");
                            break;
                        }
                    }
                    None => {
                        // Broker dropped our queue (service shutdown).
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            // ── Recv: process incoming messages ─────────────────────────
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Subscribe { mints }) => {
                                state.broker.subscribe(client_id, &mints);
                            }
                            Err(e) => {
                                debug!(client = %client_id, error = %e, "unparseable client message dropped");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(client = %client_id, error = %e, "failed to send Pong, disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Pong received, no action needed.
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!(client = %client_id, "WebSocket Close frame received");
                        break;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        debug!(client = %client_id, "WebSocket binary message ignored");
                    }
                    Some(Err(e)) => {
                        warn!(client = %client_id, error = %e, "WebSocket receive error");
                        break;
                    }
                    None => {
                        info!(client = %client_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    state.broker.disconnect(client_id);
}
