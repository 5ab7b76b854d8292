//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod events;
pub mod rig_state;
pub mod telemetry;

pub use events::{SubmitEventCommand, SubmitEventError, SubmitEventHandler, SubmitEventResult};
pub use rig_state::{
    GetRigStateHandler, RigStateError, RigStateView, UpdateRigStateCommand, UpdateRigStateHandler,
};
pub use telemetry::{IngestOutcome, IngestTelemetryHandler};
