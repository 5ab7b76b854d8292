//! HTTP handlers for `/api/telemetry`.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::adapters::http::error::ApiError;
use crate::application::{IngestOutcome, IngestTelemetryHandler};
use crate::domain::sync::EventKind;
use crate::domain::telemetry::TelemetryMessage;

#[derive(Clone)]
pub struct TelemetryHandlers {
    ingest_handler: Arc<IngestTelemetryHandler>,
}

impl TelemetryHandlers {
    pub fn new(ingest_handler: Arc<IngestTelemetryHandler>) -> Self {
        Self { ingest_handler }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// POST /api/telemetry - `{topic, payload}` from the message bus.
///
/// A discarded payload is not an error: 202 with `applied: false`.
pub async fn ingest_telemetry(
    State(handlers): State<TelemetryHandlers>,
    body: Result<Json<TelemetryMessage>, JsonRejection>,
) -> Response {
    let Json(message) = match body {
        Ok(body) => body,
        Err(rejection) => return ApiError::from(rejection).into_response(),
    };

    match handlers.ingest_handler.handle(message).await {
        Ok(IngestOutcome::Applied { kind, .. }) => (
            StatusCode::OK,
            Json(IngestResponse {
                success: true,
                applied: true,
                event_type: Some(kind),
                reason: None,
            }),
        )
            .into_response(),
        Ok(IngestOutcome::Discarded { reason }) => (
            StatusCode::ACCEPTED,
            Json(IngestResponse {
                success: true,
                applied: false,
                event_type: None,
                reason: Some(reason.to_string()),
            }),
        )
            .into_response(),
        Err(e) => ApiError::Internal(e.to_string()).into_response(),
    }
}
