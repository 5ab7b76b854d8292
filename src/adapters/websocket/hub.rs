//! Push hub: fan-out of broadcasts to every connected session.
//!
//! All sessions share one broadcast channel. The registry only tracks who
//! is connected; filtering of a session's own echoes happens on the client.
//!
//! ```text
//! PushHub ──broadcast──┬── client-a
//!                      ├── client-b
//!                      └── client-c
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use crate::domain::foundation::{ClientId, DomainError};
use crate::domain::sync::PushMessage;
use crate::ports::PushPublisher;

/// Connected-session registry plus the shared broadcast channel.
///
/// A session may hold more than one socket for a short while (a reconnect
/// that races the old socket's cleanup), so connections are counted per id.
pub struct PushHub {
    sender: broadcast::Sender<PushMessage>,
    clients: RwLock<HashMap<ClientId, usize>>,
}

impl PushHub {
    /// Create a hub whose channel buffers `channel_capacity` messages.
    ///
    /// Receivers that fall further behind than that skip ahead and miss
    /// the overwritten messages.
    pub fn new(channel_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            sender,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Create with default capacity (256 messages).
    pub fn with_default_capacity() -> Self {
        Self::new(256)
    }

    /// Register a connection and subscribe it to future broadcasts.
    pub async fn join(&self, client_id: &ClientId) -> broadcast::Receiver<PushMessage> {
        let receiver = self.sender.subscribe();
        *self.clients.write().await.entry(client_id.clone()).or_insert(0) += 1;
        tracing::debug!(client_id = %client_id, "Session joined push hub");
        receiver
    }

    /// Drop one connection of `client_id`.
    pub async fn leave(&self, client_id: &ClientId) {
        let mut clients = self.clients.write().await;
        if let Some(count) = clients.get_mut(client_id) {
            *count -= 1;
            if *count == 0 {
                clients.remove(client_id);
            }
        }
        tracing::debug!(client_id = %client_id, "Session left push hub");
    }

    /// Send to every connected session. Returns how many receivers got it.
    pub fn broadcast(&self, message: PushMessage) -> usize {
        // No receivers is fine: nobody is watching.
        self.sender.send(message).unwrap_or(0)
    }

    /// Number of distinct sessions currently connected.
    pub async fn connected_clients(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_connected(&self, client_id: &ClientId) -> bool {
        self.clients.read().await.contains_key(client_id)
    }
}

impl Default for PushHub {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[async_trait]
impl PushPublisher for PushHub {
    async fn publish(&self, message: PushMessage) -> Result<(), DomainError> {
        let kind = message.kind;
        let receivers = self.broadcast(message);
        tracing::debug!(event_type = %kind, receivers, "Broadcast push message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use crate::domain::sync::EventKind;
    use serde_json::json;

    fn message() -> PushMessage {
        PushMessage::new(EventKind::PumpUpdate, json!({"pumpId": "p1"}), Timestamp::now())
    }

    fn client(id: &str) -> ClientId {
        id.parse().unwrap()
    }

    #[tokio::test]
    async fn every_joined_session_receives_broadcast() {
        let hub = PushHub::with_default_capacity();
        let mut rx1 = hub.join(&client("a")).await;
        let mut rx2 = hub.join(&client("b")).await;

        assert_eq!(hub.broadcast(message()), 2);

        assert_eq!(rx1.recv().await.unwrap().kind, EventKind::PumpUpdate);
        assert_eq!(rx2.recv().await.unwrap().kind, EventKind::PumpUpdate);
    }

    #[tokio::test]
    async fn broadcast_without_sessions_is_noop() {
        let hub = PushHub::with_default_capacity();
        assert_eq!(hub.broadcast(message()), 0);
        hub.publish(message()).await.unwrap();
    }

    #[tokio::test]
    async fn registry_counts_distinct_sessions() {
        let hub = PushHub::with_default_capacity();
        let _a1 = hub.join(&client("a")).await;
        let _a2 = hub.join(&client("a")).await;
        let _b = hub.join(&client("b")).await;
        assert_eq!(hub.connected_clients().await, 2);

        hub.leave(&client("a")).await;
        assert!(hub.is_connected(&client("a")).await);

        hub.leave(&client("a")).await;
        assert!(!hub.is_connected(&client("a")).await);
        assert_eq!(hub.connected_clients().await, 1);
    }

    #[tokio::test]
    async fn leave_for_unknown_session_is_ignored() {
        let hub = PushHub::with_default_capacity();
        hub.leave(&client("ghost")).await;
        assert_eq!(hub.connected_clients().await, 0);
    }
}
