//! GetRigStateHandler - Query handler for the shared rig document.

use std::sync::Arc;

use super::decode_rig_state;
use crate::application::state_store::{Freshness, StateStore};
use crate::domain::rig::{RigState, RIG_STATE_KEY};

/// Current rig document plus where it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct RigStateView {
    pub state: RigState,
    pub freshness: Freshness,
}

pub struct GetRigStateHandler {
    store: Arc<StateStore>,
}

impl GetRigStateHandler {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    /// Never fails: a missing or unreadable document reads as the empty rig.
    pub async fn handle(&self) -> RigStateView {
        let snapshot = self.store.get(RIG_STATE_KEY).await;
        let state = match snapshot.value {
            Some(value) => decode_rig_state(value).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Stored rig state unreadable, serving default");
                RigState::default()
            }),
            None => RigState::default(),
        };
        RigStateView {
            state,
            freshness: snapshot.freshness,
        }
    }
}
