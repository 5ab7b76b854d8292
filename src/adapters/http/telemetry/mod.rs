//! HTTP adapter for telemetry ingest.

mod handlers;
mod routes;

pub use handlers::{IngestResponse, TelemetryHandlers};
pub use routes::telemetry_routes;
