//! Telemetry ingest handlers.

mod ingest_telemetry;

pub use ingest_telemetry::{IngestOutcome, IngestTelemetryHandler};
