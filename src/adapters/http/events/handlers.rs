//! HTTP handlers for `/api/events`.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::adapters::http::error::ApiError;
use crate::application::{SubmitEventCommand, SubmitEventError, SubmitEventHandler};
use crate::domain::sync::{EventKind, PendingEvent};

#[derive(Clone)]
pub struct EventHandlers {
    submit_handler: Arc<SubmitEventHandler>,
}

impl EventHandlers {
    pub fn new(submit_handler: Arc<SubmitEventHandler>) -> Self {
        Self { submit_handler }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitEventResponse {
    pub success: bool,
    pub event_type: EventKind,
    pub broadcast: bool,
}

/// POST /api/events - Apply a client event and re-broadcast it.
///
/// An unknown `type` fails body decoding and is answered with 400.
pub async fn submit_event(
    State(handlers): State<EventHandlers>,
    body: Result<Json<PendingEvent>, JsonRejection>,
) -> Response {
    let Json(event) = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "Rejected event body");
            return ApiError::from(rejection).into_response();
        }
    };

    let event_type = event.kind;
    match handlers.submit_handler.handle(SubmitEventCommand { event }).await {
        Ok(result) => (
            StatusCode::OK,
            Json(SubmitEventResponse {
                success: true,
                event_type,
                broadcast: result.delivered,
            }),
        )
            .into_response(),
        Err(e) => handle_submit_error(e),
    }
}

fn handle_submit_error(error: SubmitEventError) -> Response {
    match error {
        SubmitEventError::Parse(e) => ApiError::BadRequest(e.to_string()).into_response(),
        SubmitEventError::NotFound(id) => ApiError::NotFound {
            resource: "Process",
            id,
        }
        .into_response(),
        SubmitEventError::Persistence(e) => ApiError::Internal(e.to_string()).into_response(),
    }
}
