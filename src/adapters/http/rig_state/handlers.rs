//! HTTP handlers for `/api/state`.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::adapters::http::error::{ApiError, ErrorDetail};
use crate::application::handlers::{
    GetRigStateHandler, RigStateError, UpdateRigStateCommand, UpdateRigStateHandler,
};
use crate::application::Freshness;
use crate::domain::foundation::Timestamp;
use crate::domain::rig::{RigState, RigStateUpdate};
use crate::domain::sync::{EventKind, PushMessage};
use crate::ports::{Clock, PushPublisher};

#[derive(Clone)]
pub struct RigStateHandlers {
    get_handler: Arc<GetRigStateHandler>,
    update_handler: Arc<UpdateRigStateHandler>,
    publisher: Arc<dyn PushPublisher>,
    clock: Arc<dyn Clock>,
}

impl RigStateHandlers {
    pub fn new(
        get_handler: Arc<GetRigStateHandler>,
        update_handler: Arc<UpdateRigStateHandler>,
        publisher: Arc<dyn PushPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            get_handler,
            update_handler,
            publisher,
            clock,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RigStateResponse {
    pub state: RigState,
    pub freshness: Freshness,
    pub timestamp: Timestamp,
}

/// Update reply. On failure `state` is the document as currently known.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateStateResponse {
    pub success: bool,
    pub state: RigState,
    #[serde(flatten)]
    pub error: Option<ErrorDetail>,
}

/// GET /api/state - Current rig document; degrades instead of failing.
pub async fn get_state(State(handlers): State<RigStateHandlers>) -> Json<RigStateResponse> {
    let view = handlers.get_handler.handle().await;
    Json(RigStateResponse {
        state: view.state,
        freshness: view.freshness,
        timestamp: handlers.clock.now(),
    })
}

/// POST /api/state - Apply one partial update and broadcast it.
pub async fn update_state(
    State(handlers): State<RigStateHandlers>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(doc) = match body {
        Ok(body) => body,
        Err(rejection) => return handlers.update_failed(rejection.into()).await,
    };

    let update = match RigStateUpdate::from_document(doc.clone()) {
        Ok(update) => update,
        Err(e) => return handlers.update_failed(ApiError::BadRequest(e.to_string())).await,
    };

    match handlers.update_handler.handle(UpdateRigStateCommand { update }).await {
        Ok(state) => {
            let message = PushMessage::new(EventKind::StateUpdate, doc, handlers.clock.now());
            if let Err(e) = handlers.publisher.publish(message).await {
                tracing::warn!(error = %e, "State saved but broadcast failed");
            }
            let response = UpdateStateResponse {
                success: true,
                state,
                error: None,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => handlers.update_failed(rig_state_error(e)).await,
    }
}

impl RigStateHandlers {
    async fn update_failed(&self, error: ApiError) -> Response {
        let (status, detail) = error.into_parts();
        let view = self.get_handler.handle().await;
        let response = UpdateStateResponse {
            success: false,
            state: view.state,
            error: Some(detail),
        };
        (status, Json(response)).into_response()
    }
}

fn rig_state_error(error: RigStateError) -> ApiError {
    match error {
        RigStateError::Parse(e) => ApiError::BadRequest(e.to_string()),
        RigStateError::Persistence(e) => ApiError::Internal(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{ParseError, PersistenceError};

    #[test]
    fn parse_error_maps_to_400() {
        let (status, _) = rig_state_error(RigStateError::Parse(ParseError::Empty)).into_parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn persistence_error_maps_to_500() {
        let (status, _) =
            rig_state_error(RigStateError::Persistence(PersistenceError::unavailable("down")))
                .into_parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn failed_update_still_carries_a_state() {
        let body = serde_json::to_value(UpdateStateResponse {
            success: false,
            state: RigState::default(),
            error: Some(ErrorDetail::internal("down")),
        })
        .unwrap();
        assert!(body["state"].is_object());
        assert_eq!(body["code"], serde_json::json!("INTERNAL_ERROR"));
    }
}
