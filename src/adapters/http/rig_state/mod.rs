//! HTTP adapter for the shared rig document.

mod handlers;
mod routes;

pub use handlers::{RigStateHandlers, RigStateResponse, UpdateStateResponse};
pub use routes::rig_state_routes;
