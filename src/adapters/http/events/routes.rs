//! HTTP routes for event submission.

use axum::{routing::post, Router};

use super::handlers::{submit_event, EventHandlers};

/// `POST /events` (relative to `/api`).
pub fn event_routes(handlers: EventHandlers) -> Router {
    Router::new()
        .route("/events", post(submit_event))
        .with_state(handlers)
}
