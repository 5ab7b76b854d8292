//! HTTP routes for process endpoints.

use axum::{routing::get, Router};

use super::handlers::{delete_processes, list_processes, upsert_processes, ProcessHandlers};

/// Routes (relative to `/api`):
/// - `GET /processes` - Whole collection
/// - `POST /processes` - Merge by id
/// - `DELETE /processes?id=..` / `?all=true`
pub fn process_routes(handlers: ProcessHandlers) -> Router {
    Router::new()
        .route(
            "/processes",
            get(list_processes).post(upsert_processes).delete(delete_processes),
        )
        .with_state(handlers)
}
