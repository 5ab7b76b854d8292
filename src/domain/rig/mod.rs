//! Rig module - the shared operational document.
//!
//! Tanks, pumps, valves and per-actor progress, plus the partial update
//! shapes sessions submit against them.

mod state;
mod update;

pub use state::{PumpEntry, PumpStatus, RigState, Tank, RIG_STATE_KEY};
pub use update::{RigStateUpdate, ValveInput};
