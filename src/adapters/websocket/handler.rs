//! WebSocket upgrade handler for the push channel.
//!
//! Connection lifecycle:
//! 1. Upgrade to WebSocket
//! 2. Join the push hub under the session's client id
//! 3. Send the `connected` greeting
//! 4. Forward hub broadcasts until either side closes
//! 5. Leave the hub

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::domain::foundation::{ClientId, Timestamp};
use crate::domain::sync::PushMessage;

use super::hub::PushHub;

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub hub: Arc<PushHub>,
}

impl WebSocketState {
    pub fn new(hub: Arc<PushHub>) -> Self {
        Self { hub }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveQuery {
    pub client_id: Option<String>,
}

/// Handle WebSocket upgrade requests for the push channel.
///
/// Route: `GET /api/live?clientId=...`
///
/// A missing or blank `clientId` gets a server-generated one, announced in
/// the greeting.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<LiveQuery>,
    State(state): State<WebSocketState>,
) -> Response {
    let client_id = query
        .client_id
        .and_then(|raw| raw.parse::<ClientId>().ok())
        .unwrap_or_else(ClientId::generate);

    ws.on_upgrade(move |socket| handle_socket(socket, client_id, state))
}

async fn handle_socket(socket: WebSocket, client_id: ClientId, state: WebSocketState) {
    let (mut sender, mut receiver) = socket.split();

    let mut hub_rx: broadcast::Receiver<PushMessage> = state.hub.join(&client_id).await;

    let greeting = PushMessage::connected(&client_id, Timestamp::now());
    if let Err(e) = send_message(&mut sender, &greeting).await {
        tracing::debug!(client_id = %client_id, "Failed to send connected message: {}", e);
        state.hub.leave(&client_id).await;
        return;
    }

    let mut send_task = {
        let client_id = client_id.clone();
        tokio::spawn(async move {
            loop {
                match hub_rx.recv().await {
                    Ok(message) => {
                        if let Err(e) = send_message(&mut sender, &message).await {
                            tracing::debug!(client_id = %client_id, "Send error, closing connection: {}", e);
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(client_id = %client_id, skipped, "Slow session missed broadcasts");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    };

    // The push channel is one-way; inbound frames only matter for close.
    let mut recv_task = {
        let client_id = client_id.clone();
        tokio::spawn(async move {
            while let Some(result) = receiver.next().await {
                match result {
                    Ok(Message::Close(_)) => {
                        tracing::debug!(client_id = %client_id, "Client sent close frame");
                        break;
                    }
                    Ok(Message::Text(text)) => {
                        tracing::trace!(client_id = %client_id, len = text.len(), "Ignoring inbound text frame");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(client_id = %client_id, "Receive error: {}", e);
                        break;
                    }
                }
            }
        })
    };

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.hub.leave(&client_id).await;
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &PushMessage,
) -> Result<(), axum::Error> {
    let json = msg.to_json().map_err(axum::Error::new)?;
    sender.send(Message::Text(json)).await
}

/// Create axum router for the push endpoint.
pub fn websocket_router() -> axum::Router<WebSocketState> {
    use axum::routing::get;

    axum::Router::new().route("/live", get(ws_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_state_shares_hub() {
        let hub = Arc::new(PushHub::default());
        let state = WebSocketState::new(hub.clone());
        assert!(Arc::ptr_eq(&state.hub, &hub));
    }

    #[test]
    fn websocket_router_creates_route() {
        let _router = websocket_router();
    }
}
