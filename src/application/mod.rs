//! Application layer - Services and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Writes go through command handlers; reads through query handlers that
//! never fail.

pub mod collection_reconciler;
pub mod handlers;
pub mod state_store;

pub use collection_reconciler::{
    CollectionReconciler, DeleteResult, ProcessError, UpsertResult, PROCESSES_KEY,
};
pub use handlers::{
    GetRigStateHandler, IngestOutcome, IngestTelemetryHandler, RigStateError, RigStateView,
    SubmitEventCommand, SubmitEventError, SubmitEventHandler, SubmitEventResult,
    UpdateRigStateCommand, UpdateRigStateHandler,
};
pub use state_store::{Freshness, StateSnapshot, StateStore};
