//! Rig state handlers.

mod get_rig_state;
mod update_rig_state;

pub use get_rig_state::{GetRigStateHandler, RigStateView};
pub use update_rig_state::{RigStateError, UpdateRigStateCommand, UpdateRigStateHandler};

use serde_json::Value;

use crate::domain::foundation::PersistenceError;
use crate::domain::rig::{RigState, RIG_STATE_KEY};

pub(crate) fn decode_rig_state(value: Value) -> Result<RigState, PersistenceError> {
    serde_json::from_value(value).map_err(|e| PersistenceError::Corrupt {
        key: RIG_STATE_KEY.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn encode_rig_state(state: &RigState) -> Result<Value, PersistenceError> {
    serde_json::to_value(state).map_err(|e| PersistenceError::Serialization {
        key: RIG_STATE_KEY.to_string(),
        reason: e.to_string(),
    })
}
