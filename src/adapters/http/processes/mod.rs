//! HTTP adapter for the process definition collection.

mod dto;
mod handlers;
mod routes;

pub use dto::{DeleteProcessesQuery, DeleteProcessesResponse, DeleteTarget, UpsertProcessesResponse};
pub use handlers::ProcessHandlers;
pub use routes::process_routes;
