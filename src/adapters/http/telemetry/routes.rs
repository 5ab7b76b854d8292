//! HTTP routes for telemetry ingest.

use axum::{routing::post, Router};

use super::handlers::{ingest_telemetry, TelemetryHandlers};

/// `POST /telemetry` (relative to `/api`).
pub fn telemetry_routes(handlers: TelemetryHandlers) -> Router {
    Router::new()
        .route("/telemetry", post(ingest_telemetry))
        .with_state(handlers)
}
