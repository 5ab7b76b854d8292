//! HTTP routes for the rig document.

use axum::{routing::get, Router};

use super::handlers::{get_state, update_state, RigStateHandlers};

/// Routes (relative to `/api`):
/// - `GET /state` - Current document with freshness
/// - `POST /state` - Partial update
pub fn rig_state_routes(handlers: RigStateHandlers) -> Router {
    Router::new()
        .route("/state", get(get_state).post(update_state))
        .with_state(handlers)
}
