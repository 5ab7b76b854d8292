//! SubmitEventHandler - Command handler for client-submitted events.
//!
//! Applies the state change an event describes, then re-broadcasts it
//! tagged with the submitting client so that client can skip its echo.

use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;

use crate::application::collection_reconciler::{CollectionReconciler, ProcessError, PROCESSES_KEY};
use crate::application::handlers::rig_state::{
    RigStateError, UpdateRigStateCommand, UpdateRigStateHandler,
};
use crate::domain::foundation::{ParseError, PersistenceError};
use crate::domain::process::ProcessSubmission;
use crate::domain::rig::RigStateUpdate;
use crate::domain::sync::{EventKind, PendingEvent, PushMessage};
use crate::domain::telemetry::parse_progress;
use crate::ports::{Clock, PushPublisher};

#[derive(Debug, Error)]
pub enum SubmitEventError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Process not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<RigStateError> for SubmitEventError {
    fn from(err: RigStateError) -> Self {
        match err {
            RigStateError::Parse(e) => SubmitEventError::Parse(e),
            RigStateError::Persistence(e) => SubmitEventError::Persistence(e),
        }
    }
}

impl From<ProcessError> for SubmitEventError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::NotFound(id) => SubmitEventError::NotFound(id),
            ProcessError::Parse(e) => SubmitEventError::Parse(e),
            ProcessError::Persistence(e) => SubmitEventError::Persistence(e),
        }
    }
}

/// Command wrapping one event exactly as the client sent it.
#[derive(Debug, Clone)]
pub struct SubmitEventCommand {
    pub event: PendingEvent,
}

/// The broadcast produced by a successful submission.
#[derive(Debug, Clone)]
pub struct SubmitEventResult {
    pub broadcast: PushMessage,
    /// False when the write landed but publishing failed.
    pub delivered: bool,
}

pub struct SubmitEventHandler {
    updater: Arc<UpdateRigStateHandler>,
    processes: Arc<CollectionReconciler>,
    publisher: Arc<dyn PushPublisher>,
    clock: Arc<dyn Clock>,
}

impl SubmitEventHandler {
    pub fn new(
        updater: Arc<UpdateRigStateHandler>,
        processes: Arc<CollectionReconciler>,
        publisher: Arc<dyn PushPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            updater,
            processes,
            publisher,
            clock,
        }
    }

    pub async fn handle(&self, cmd: SubmitEventCommand) -> Result<SubmitEventResult, SubmitEventError> {
        let event = cmd.event;
        if !event.kind.is_submittable() {
            return Err(ParseError::UnknownEventType(event.kind.to_string()).into());
        }

        // 1. Apply
        let payload = match event.kind {
            EventKind::PumpUpdate
            | EventKind::ValveUpdate
            | EventKind::TankUpdate
            | EventKind::StateUpdate => self.apply_rig_update(event.kind, event.data).await?,
            EventKind::ProcessUpsert => self.apply_upsert(event.data).await?,
            EventKind::ProcessDelete => self.apply_delete(event.data).await?,
            EventKind::ProgressUpdate => self.apply_progress(event.data).await?,
            EventKind::ClientLeaving => {
                tracing::info!(client_id = %event.client_id, "Client leaving");
                event.data
            }
            EventKind::Connected | EventKind::ConnectionStatus => {
                return Err(ParseError::UnknownEventType(event.kind.to_string()).into())
            }
        };

        // 2. Re-broadcast, tagged with the sender
        let broadcast =
            PushMessage::new(event.kind, payload, self.clock.now()).from_client(event.client_id.clone());
        let delivered = match self.publisher.publish(broadcast.clone()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    client_id = %event.client_id,
                    event_type = %event.kind,
                    error = %e,
                    "Event applied but broadcast failed"
                );
                false
            }
        };

        tracing::debug!(client_id = %event.client_id, event_type = %event.kind, "Event submitted");
        Ok(SubmitEventResult { broadcast, delivered })
    }

    async fn apply_rig_update(&self, kind: EventKind, data: Value) -> Result<Value, SubmitEventError> {
        let doc = match (kind, data) {
            (EventKind::TankUpdate, Value::Array(tanks)) => json!({ "tanks": tanks }),
            (_, other) => other,
        };
        let update = RigStateUpdate::from_document(doc.clone())?;

        let shape_matches = match kind {
            EventKind::PumpUpdate => matches!(update, RigStateUpdate::Pump { .. }),
            EventKind::ValveUpdate => matches!(update, RigStateUpdate::Valve { .. }),
            EventKind::TankUpdate => matches!(update, RigStateUpdate::Tanks(_)),
            _ => true,
        };
        if !shape_matches {
            return Err(ParseError::Malformed(format!("payload does not describe a {}", kind)).into());
        }

        self.updater.handle(UpdateRigStateCommand { update }).await?;
        Ok(doc)
    }

    async fn apply_upsert(&self, data: Value) -> Result<Value, SubmitEventError> {
        let incoming = ProcessSubmission::from_value(data)?.into_definitions();
        let result = self.processes.upsert(incoming).await?;
        // Peers need the assigned ids, not the raw submission.
        serde_json::to_value(&result.upserted).map_err(|e| {
            PersistenceError::Serialization {
                key: PROCESSES_KEY.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn apply_delete(&self, data: Value) -> Result<Value, SubmitEventError> {
        if data.get("all").and_then(Value::as_bool).unwrap_or(false) {
            let result = self.processes.delete_all().await?;
            return Ok(json!({ "all": true, "removed": result.removed }));
        }
        let id = data
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ParseError::Malformed("process/delete needs an id or all".to_string()))?;
        self.processes.delete(id).await?;
        Ok(json!({ "id": id }))
    }

    async fn apply_progress(&self, data: Value) -> Result<Value, SubmitEventError> {
        let actor_id = data
            .get("actorId")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ParseError::Malformed("progress/update needs an actorId".to_string()))?
            .to_string();
        let raw = match data.get("progress") {
            Some(Value::String(text)) => text.clone(),
            Some(doc) => doc.to_string(),
            None => data.to_string(),
        };
        let sample = parse_progress(&raw)?;
        let percent = sample.percent();

        self.updater
            .modify(|state, now| {
                state.set_progress(&actor_id, sample.clone());
                state.touch(now);
                Ok(())
            })
            .await?;

        Ok(json!({ "actorId": actor_id, "progress": sample, "percent": percent }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cache::InMemoryStateCache;
    use crate::adapters::events::RecordingPushPublisher;
    use crate::adapters::storage::InMemoryStateBackend;
    use crate::application::state_store::StateStore;
    use crate::domain::foundation::Timestamp;
    use crate::domain::rig::RIG_STATE_KEY;
    use crate::ports::{ManualClock, SequentialIdGenerator};
    use std::time::Duration;

    struct Fixture {
        handler: SubmitEventHandler,
        backend: Arc<InMemoryStateBackend>,
        publisher: Arc<RecordingPushPublisher>,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(InMemoryStateBackend::new());
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(StateStore::new(
            backend.clone(),
            Arc::new(InMemoryStateCache::new()),
            clock.clone(),
            Duration::from_secs(300),
        ));
        let publisher = Arc::new(RecordingPushPublisher::new());
        let handler = SubmitEventHandler::new(
            Arc::new(UpdateRigStateHandler::new(store.clone(), clock.clone())),
            Arc::new(CollectionReconciler::new(
                store,
                Arc::new(SequentialIdGenerator::new()),
                clock.clone(),
            )),
            publisher.clone(),
            clock,
        );
        Fixture {
            handler,
            backend,
            publisher,
        }
    }

    fn cmd(kind: EventKind, data: Value) -> SubmitEventCommand {
        SubmitEventCommand {
            event: PendingEvent::new(
                kind,
                "client-a".parse().unwrap(),
                Timestamp::from_unix_millis(0),
                data,
            ),
        }
    }

    #[tokio::test]
    async fn pump_update_applies_and_broadcasts_with_origin() {
        let f = fixture();
        let result = f
            .handler
            .handle(cmd(EventKind::PumpUpdate, json!({"pumpId": "p3", "status": "ON"})))
            .await
            .unwrap();

        assert!(result.delivered);
        assert_eq!(result.broadcast.origin(), Some("client-a"));
        let stored = f.backend.snapshot(RIG_STATE_KEY).await.unwrap();
        assert_eq!(stored["pumps"]["p3"], json!("ON"));
        assert_eq!(f.publisher.of_kind(EventKind::PumpUpdate).len(), 1);
    }

    #[tokio::test]
    async fn tank_array_is_wrapped() {
        let f = fixture();
        f.handler
            .handle(cmd(
                EventKind::TankUpdate,
                json!([{"id": "t1", "pumps": [{"id": "p1", "status": "OFF"}]}]),
            ))
            .await
            .unwrap();
        let stored = f.backend.snapshot(RIG_STATE_KEY).await.unwrap();
        assert_eq!(stored["pumps"]["p1"], json!("OFF"));
    }

    #[tokio::test]
    async fn mismatched_shape_is_a_parse_error() {
        let f = fixture();
        let err = f
            .handler
            .handle(cmd(EventKind::PumpUpdate, json!({"foo": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitEventError::Parse(_)));
        assert_eq!(f.publisher.count(), 0);
    }

    #[tokio::test]
    async fn process_upsert_broadcasts_assigned_ids() {
        let f = fixture();
        let result = f
            .handler
            .handle(cmd(EventKind::ProcessUpsert, json!({"name": "Flush"})))
            .await
            .unwrap();
        assert_eq!(result.broadcast.payload[0]["id"], json!("proc-1"));
        assert!(f.backend.snapshot(PROCESSES_KEY).await.is_some());
    }

    #[tokio::test]
    async fn process_delete_miss_is_not_found() {
        let f = fixture();
        let err = f
            .handler
            .handle(cmd(EventKind::ProcessDelete, json!({"id": "nope"})))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitEventError::NotFound(ref id) if id == "nope"));
    }

    #[tokio::test]
    async fn progress_update_replaces_sample() {
        let f = fixture();
        f.handler
            .handle(cmd(
                EventKind::ProgressUpdate,
                json!({"actorId": "pump3", "progress": "Elapsed: 30s, Remaining: 30s"}),
            ))
            .await
            .unwrap();
        let stored = f.backend.snapshot(RIG_STATE_KEY).await.unwrap();
        assert_eq!(stored["progress"]["pump3"]["elapsed"], json!(30.0));
        let sent = f.publisher.of_kind(EventKind::ProgressUpdate);
        assert_eq!(sent[0].payload["percent"], json!(50.0));
    }

    #[tokio::test]
    async fn client_leaving_is_rebroadcast_without_state_change() {
        let f = fixture();
        f.handler
            .handle(cmd(EventKind::ClientLeaving, json!({"clientId": "client-a"})))
            .await
            .unwrap();
        assert!(f.publisher.has_kind(EventKind::ClientLeaving));
        assert_eq!(f.backend.snapshot(RIG_STATE_KEY).await, None);
    }

    #[tokio::test]
    async fn server_only_kinds_are_rejected() {
        let f = fixture();
        let err = f
            .handler
            .handle(cmd(EventKind::Connected, json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitEventError::Parse(ParseError::UnknownEventType(_))));
    }

    #[tokio::test]
    async fn publish_failure_does_not_undo_the_write() {
        let f = fixture();
        f.publisher.set_fail(true);
        let result = f
            .handler
            .handle(cmd(EventKind::StateUpdate, json!({"mode": "auto"})))
            .await
            .unwrap();
        assert!(!result.delivered);
        let stored = f.backend.snapshot(RIG_STATE_KEY).await.unwrap();
        assert_eq!(stored["mode"], json!("auto"));
    }
}
