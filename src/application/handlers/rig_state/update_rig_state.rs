//! UpdateRigStateHandler - Command handler for partial rig updates.

use std::sync::Arc;

use thiserror::Error;

use super::{decode_rig_state, encode_rig_state};
use crate::application::state_store::StateStore;
use crate::domain::foundation::{ParseError, PersistenceError, Timestamp};
use crate::domain::rig::{RigState, RigStateUpdate, RIG_STATE_KEY};
use crate::ports::Clock;

#[derive(Debug, Error)]
pub enum RigStateError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Command to apply one normalized partial update.
#[derive(Debug, Clone)]
pub struct UpdateRigStateCommand {
    pub update: RigStateUpdate,
}

pub struct UpdateRigStateHandler {
    store: Arc<StateStore>,
    clock: Arc<dyn Clock>,
}

impl UpdateRigStateHandler {
    pub fn new(store: Arc<StateStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Apply the update atomically and return the resulting document.
    pub async fn handle(&self, cmd: UpdateRigStateCommand) -> Result<RigState, RigStateError> {
        self.modify(|state, now| cmd.update.apply(state, now)).await
    }

    /// Read-modify-write of the rig document with an arbitrary mutation.
    ///
    /// Nothing is written when `f` fails.
    pub async fn modify<F>(&self, f: F) -> Result<RigState, RigStateError>
    where
        F: FnOnce(&mut RigState, Timestamp) -> Result<(), ParseError>,
    {
        let now = self.clock.now();
        self.store
            .update(RIG_STATE_KEY, move |current| {
                let mut state = current.map(decode_rig_state).transpose()?.unwrap_or_default();
                f(&mut state, now)?;
                let value = encode_rig_state(&state)?;
                Ok::<_, RigStateError>((value, state))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cache::InMemoryStateCache;
    use crate::adapters::storage::InMemoryStateBackend;
    use crate::domain::rig::PumpStatus;
    use crate::ports::ManualClock;
    use serde_json::json;
    use std::time::Duration;

    fn handler() -> (UpdateRigStateHandler, Arc<InMemoryStateBackend>) {
        let backend = Arc::new(InMemoryStateBackend::new());
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(StateStore::new(
            backend.clone(),
            Arc::new(InMemoryStateCache::new()),
            clock.clone(),
            Duration::from_secs(300),
        ));
        (UpdateRigStateHandler::new(store, clock), backend)
    }

    fn cmd(doc: serde_json::Value) -> UpdateRigStateCommand {
        UpdateRigStateCommand {
            update: RigStateUpdate::from_document(doc).unwrap(),
        }
    }

    #[tokio::test]
    async fn pump_update_is_persisted() {
        let (handler, backend) = handler();
        let state = handler
            .handle(cmd(json!({"pumpId": "p3", "status": "ON"})))
            .await
            .unwrap();

        assert_eq!(state.pumps["p3"], PumpStatus::On);
        let stored = backend.snapshot(RIG_STATE_KEY).await.unwrap();
        assert_eq!(stored["pumps"]["p3"], json!("ON"));
        assert!(stored["updatedAt"].is_string());
    }

    #[tokio::test]
    async fn updates_accumulate() {
        let (handler, _) = handler();
        handler
            .handle(cmd(json!({"tanks": [{"id": "t1", "pumps": [{"id": "p1", "status": "OFF"}]}]})))
            .await
            .unwrap();
        let state = handler
            .handle(cmd(json!({"pumpId": "p1", "status": true})))
            .await
            .unwrap();

        assert_eq!(state.tanks[0].pumps[0].status, PumpStatus::On);
    }

    #[tokio::test]
    async fn failed_parse_writes_nothing() {
        let (handler, backend) = handler();
        let err = handler
            .handle(cmd(json!({"valveId": "v1", "valve": {"unknown": true}})))
            .await
            .unwrap_err();

        assert!(matches!(err, RigStateError::Parse(_)));
        assert_eq!(backend.snapshot(RIG_STATE_KEY).await, None);
    }

    #[tokio::test]
    async fn backend_failure_is_surfaced() {
        let (handler, backend) = handler();
        backend.set_fail_writes(true);
        let err = handler
            .handle(cmd(json!({"mode": "auto"})))
            .await
            .unwrap_err();
        assert!(matches!(err, RigStateError::Persistence(_)));
    }
}
