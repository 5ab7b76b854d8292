//! HTTP adapter for client event submission.

mod handlers;
mod routes;

pub use handlers::{EventHandlers, SubmitEventResponse};
pub use routes::event_routes;
