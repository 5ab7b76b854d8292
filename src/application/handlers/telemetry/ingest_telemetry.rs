//! IngestTelemetryHandler - folds raw bus telemetry into the rig document.
//!
//! Unusable payloads are discarded: the document is not written and no
//! broadcast goes out. Only backend failures are errors.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::application::handlers::rig_state::{RigStateError, UpdateRigStateHandler};
use crate::domain::foundation::{ParseError, PersistenceError};
use crate::domain::sync::{EventKind, PushMessage};
use crate::domain::telemetry::{
    normalize_valve, parse_progress, TelemetryMessage, TelemetryTopic, ValveSource,
    ValveTelemetry,
};
use crate::ports::{Clock, PushPublisher};

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// State changed and the change was broadcast as `kind`.
    Applied { kind: EventKind, payload: Value },
    /// Payload unusable; state untouched.
    Discarded { reason: ParseError },
}

impl IngestOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, IngestOutcome::Applied { .. })
    }
}

pub struct IngestTelemetryHandler {
    updater: Arc<UpdateRigStateHandler>,
    publisher: Arc<dyn PushPublisher>,
    clock: Arc<dyn Clock>,
}

impl IngestTelemetryHandler {
    pub fn new(
        updater: Arc<UpdateRigStateHandler>,
        publisher: Arc<dyn PushPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            updater,
            publisher,
            clock,
        }
    }

    pub async fn handle(&self, msg: TelemetryMessage) -> Result<IngestOutcome, PersistenceError> {
        let topic = match TelemetryTopic::parse(&msg.topic) {
            Ok(topic) => topic,
            Err(reason) => return Ok(self.discard(&msg, reason)),
        };

        let applied = match topic {
            TelemetryTopic::ValveStatus { valve_id } => self.apply_valve(&valve_id, &msg.payload).await,
            TelemetryTopic::Progress { actor_id } => self.apply_progress(&actor_id, &msg.payload).await,
        };

        let (kind, payload) = match applied {
            Ok(change) => change,
            Err(RigStateError::Parse(reason)) => return Ok(self.discard(&msg, reason)),
            Err(RigStateError::Persistence(e)) => return Err(e),
        };

        let message = PushMessage::new(kind, payload.clone(), self.clock.now());
        if let Err(e) = self.publisher.publish(message).await {
            tracing::warn!(event_type = %kind, error = %e, "Telemetry broadcast failed");
        }
        Ok(IngestOutcome::Applied { kind, payload })
    }

    async fn apply_valve(&self, valve_id: &str, raw: &str) -> Result<(EventKind, Value), RigStateError> {
        let telemetry = ValveTelemetry::from_payload(raw);
        let mut source = None;

        let state = self
            .updater
            .modify(|state, now| {
                let (valve, from) = normalize_valve(&telemetry, state.valves.get(valve_id))?;
                if from == ValveSource::Previous {
                    // Nothing live to apply.
                    return Err(ParseError::ValveStatus(raw.to_string()));
                }
                source = Some(from);
                state.set_valve(valve_id, valve);
                state.touch(now);
                Ok(())
            })
            .await?;

        tracing::debug!(valve_id, source = ?source, "Applied valve telemetry");
        Ok((
            EventKind::ValveUpdate,
            json!({ "valveId": valve_id, "valve": state.valves.get(valve_id) }),
        ))
    }

    async fn apply_progress(&self, actor_id: &str, raw: &str) -> Result<(EventKind, Value), RigStateError> {
        let sample = parse_progress(raw)?;
        let percent = sample.percent();

        self.updater
            .modify(|state, now| {
                state.set_progress(actor_id, sample.clone());
                state.touch(now);
                Ok(())
            })
            .await?;

        tracing::debug!(actor_id, percent, "Applied progress telemetry");
        Ok((
            EventKind::ProgressUpdate,
            json!({ "actorId": actor_id, "progress": sample, "percent": percent }),
        ))
    }

    fn discard(&self, msg: &TelemetryMessage, reason: ParseError) -> IngestOutcome {
        tracing::debug!(topic = %msg.topic, error = %reason, "Discarding telemetry");
        IngestOutcome::Discarded { reason }
    }
}
