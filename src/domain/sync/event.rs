//! Event kinds and the two wire shapes that carry them.
//!
//! - [`PendingEvent`]: client → server submission `{type, clientId, timestamp, data}`
//! - [`PushMessage`]: server → client broadcast, either channel-tagged
//!   `{channel, action, payload, ...}` or flat `{type, payload, ...}`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::{ClientId, ParseError, Timestamp};

/// Closed set of event kinds understood by both ends of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EventKind {
    PumpUpdate,
    ValveUpdate,
    TankUpdate,
    StateUpdate,
    ProcessUpsert,
    ProcessDelete,
    ProgressUpdate,
    ClientLeaving,
    /// Server greeting sent once per push connection.
    Connected,
    /// Local notification of connection state transitions; never on the wire.
    ConnectionStatus,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::PumpUpdate,
        EventKind::ValveUpdate,
        EventKind::TankUpdate,
        EventKind::StateUpdate,
        EventKind::ProcessUpsert,
        EventKind::ProcessDelete,
        EventKind::ProgressUpdate,
        EventKind::ClientLeaving,
        EventKind::Connected,
        EventKind::ConnectionStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PumpUpdate => "pump/update",
            EventKind::ValveUpdate => "valve/update",
            EventKind::TankUpdate => "tank/update",
            EventKind::StateUpdate => "state/update",
            EventKind::ProcessUpsert => "process/upsert",
            EventKind::ProcessDelete => "process/delete",
            EventKind::ProgressUpdate => "progress/update",
            EventKind::ClientLeaving => "client/leaving",
            EventKind::Connected => "connected",
            EventKind::ConnectionStatus => "connection/status",
        }
    }

    /// `(channel, action)` for composite kinds.
    pub fn channel_action(&self) -> Option<(&'static str, &'static str)> {
        self.as_str().split_once('/')
    }

    /// Kinds a client may submit to the server.
    pub fn is_submittable(&self) -> bool {
        !matches!(self, EventKind::Connected | EventKind::ConnectionStatus)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseError::UnknownEventType(wanted.to_string()))
    }
}

impl TryFrom<String> for EventKind {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

/// An outbound client event. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub client_id: ClientId,
    pub timestamp: Timestamp,
    #[serde(default, alias = "payload")]
    pub data: Value,
}

impl PendingEvent {
    pub fn new(kind: EventKind, client_id: ClientId, timestamp: Timestamp, data: Value) -> Self {
        Self {
            kind,
            client_id,
            timestamp,
            data,
        }
    }
}

/// A server broadcast as seen by both hub and client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireMessage", try_from = "WireMessage")]
pub struct PushMessage {
    pub kind: EventKind,
    pub payload: Value,
    pub timestamp: Timestamp,
    /// Session that caused this broadcast, if any.
    pub client_id: Option<ClientId>,
    pub broadcast_to_self: bool,
}

impl PushMessage {
    pub fn new(kind: EventKind, payload: Value, timestamp: Timestamp) -> Self {
        Self {
            kind,
            payload,
            timestamp,
            client_id: None,
            broadcast_to_self: false,
        }
    }

    pub fn from_client(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn echo_to_sender(mut self) -> Self {
        self.broadcast_to_self = true;
        self
    }

    /// Greeting sent to a freshly connected session.
    pub fn connected(client_id: &ClientId, timestamp: Timestamp) -> Self {
        Self::new(
            EventKind::Connected,
            serde_json::json!({ "clientId": client_id }),
            timestamp,
        )
    }

    /// Decode one inbound text frame.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        if text.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        let wire: WireMessage =
            serde_json::from_str(text).map_err(|e| ParseError::Malformed(e.to_string()))?;
        PushMessage::try_from(wire)
    }

    /// Originating session, from the envelope or else from the payload.
    pub fn origin(&self) -> Option<&str> {
        self.client_id
            .as_ref()
            .map(ClientId::as_str)
            .or_else(|| self.payload.get("clientId").and_then(Value::as_str))
    }

    /// Whether a session with `local` id should ignore this message.
    pub fn is_echo_for(&self, local: &ClientId) -> bool {
        !self.broadcast_to_self && self.origin() == Some(local.as_str())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<String>,
    #[serde(default, alias = "data")]
    payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_id: Option<ClientId>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    broadcast_to_self: bool,
}

impl From<PushMessage> for WireMessage {
    fn from(msg: PushMessage) -> Self {
        let (kind, channel, action) = match msg.kind.channel_action() {
            Some((channel, action)) => (None, Some(channel.to_string()), Some(action.to_string())),
            None => (Some(msg.kind.as_str().to_string()), None, None),
        };
        WireMessage {
            kind,
            channel,
            action,
            payload: msg.payload,
            timestamp: Some(msg.timestamp),
            client_id: msg.client_id,
            broadcast_to_self: msg.broadcast_to_self,
        }
    }
}

impl TryFrom<WireMessage> for PushMessage {
    type Error = ParseError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let name = match (&wire.channel, &wire.action, &wire.kind) {
            (Some(channel), Some(action), _) => format!("{}/{}", channel, action),
            (_, _, Some(kind)) => kind.clone(),
            _ => {
                return Err(ParseError::Malformed(
                    "message has neither type nor channel/action".to_string(),
                ))
            }
        };
        Ok(PushMessage {
            kind: name.parse()?,
            payload: wire.payload,
            timestamp: wire.timestamp.unwrap_or_default(),
            client_id: wire.client_id,
            broadcast_to_self: wire.broadcast_to_self,
        })
    }
}
