//! Bus topics carrying telemetry the dashboard understands.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ParseError;

/// One raw message taken off the message bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    pub topic: String,
    pub payload: String,
}

/// Recognized telemetry topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryTopic {
    /// `valves/<valveId>/status`
    ValveStatus { valve_id: String },
    /// `progress/<actorId>`
    Progress { actor_id: String },
}

impl TelemetryTopic {
    pub fn parse(topic: &str) -> Result<Self, ParseError> {
        let parts: Vec<&str> = topic.trim_matches('/').split('/').collect();
        match parts.as_slice() {
            ["valves", id, "status"] if !id.is_empty() => Ok(Self::ValveStatus {
                valve_id: (*id).to_string(),
            }),
            ["progress", id] if !id.is_empty() => Ok(Self::Progress {
                actor_id: (*id).to_string(),
            }),
            _ => Err(ParseError::Malformed(format!("unrecognized topic '{}'", topic))),
        }
    }
}
