//! HTTP handlers for `/api/processes`.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use super::dto::{DeleteProcessesQuery, DeleteProcessesResponse, DeleteTarget, UpsertProcessesResponse};
use crate::adapters::http::error::ApiError;
use crate::application::{CollectionReconciler, Freshness, ProcessError};
use crate::domain::process::ProcessSubmission;
use crate::domain::sync::{EventKind, PushMessage};
use crate::ports::{Clock, PushPublisher};

#[derive(Clone)]
pub struct ProcessHandlers {
    reconciler: Arc<CollectionReconciler>,
    publisher: Arc<dyn PushPublisher>,
    clock: Arc<dyn Clock>,
}

impl ProcessHandlers {
    pub fn new(
        reconciler: Arc<CollectionReconciler>,
        publisher: Arc<dyn PushPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reconciler,
            publisher,
            clock,
        }
    }

    async fn broadcast(&self, kind: EventKind, payload: Value) {
        let message = PushMessage::new(kind, payload, self.clock.now());
        if let Err(e) = self.publisher.publish(message).await {
            tracing::warn!(event_type = %kind, error = %e, "Process change saved but broadcast failed");
        }
    }
}

/// GET /api/processes - Raw array; `[]` with 500 when the store is down
/// and nothing is cached.
pub async fn list_processes(State(handlers): State<ProcessHandlers>) -> Response {
    let (processes, freshness) = handlers.reconciler.list().await;
    let status = match freshness {
        Freshness::Default => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    };
    (status, Json(processes)).into_response()
}

/// POST /api/processes - Upsert one definition, an array, or `{sequences}`.
pub async fn upsert_processes(
    State(handlers): State<ProcessHandlers>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return handlers.upsert_failed(rejection.into()).await,
    };
    let incoming = match ProcessSubmission::from_value(body) {
        Ok(submission) => submission.into_definitions(),
        Err(e) => return handlers.upsert_failed(ApiError::BadRequest(e.to_string())).await,
    };

    match handlers.reconciler.upsert(incoming).await {
        Ok(result) => {
            let response = UpsertProcessesResponse::from(result);
            handlers
                .broadcast(EventKind::ProcessUpsert, json!(response.upserted))
                .await;
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => handlers.upsert_failed(process_error(e)).await,
    }
}

/// DELETE /api/processes?id=.. or ?all=true
pub async fn delete_processes(
    State(handlers): State<ProcessHandlers>,
    query: Result<Query<DeleteProcessesQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            return handlers
                .delete_failed(ApiError::BadRequest(rejection.body_text()))
                .await
        }
    };

    let (result, payload) = match query.target() {
        Some(DeleteTarget::One(id)) => {
            let result = handlers.reconciler.delete(&id).await;
            (result, json!({ "id": id }))
        }
        Some(DeleteTarget::All) => (handlers.reconciler.delete_all().await, json!({ "all": true })),
        None => {
            return handlers
                .delete_failed(ApiError::BadRequest(
                    "Specify ?id=<processId> or ?all=true".to_string(),
                ))
                .await
        }
    };

    match result {
        Ok(result) => {
            handlers.broadcast(EventKind::ProcessDelete, payload).await;
            (StatusCode::OK, Json(DeleteProcessesResponse::from(result))).into_response()
        }
        Err(e) => handlers.delete_failed(process_error(e)).await,
    }
}

impl ProcessHandlers {
    async fn upsert_failed(&self, error: ApiError) -> Response {
        let (status, detail) = error.into_parts();
        let (processes, _) = self.reconciler.list().await;
        (status, Json(UpsertProcessesResponse::failed(processes, detail))).into_response()
    }

    async fn delete_failed(&self, error: ApiError) -> Response {
        let (status, detail) = error.into_parts();
        let (processes, _) = self.reconciler.list().await;
        (status, Json(DeleteProcessesResponse::failed(processes, detail))).into_response()
    }
}

fn process_error(error: ProcessError) -> ApiError {
    match error {
        ProcessError::NotFound(id) => ApiError::NotFound {
            resource: "Process",
            id,
        },
        ProcessError::Parse(e) => ApiError::BadRequest(e.to_string()),
        ProcessError::Persistence(e) => ApiError::Internal(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::PersistenceError;

    #[test]
    fn not_found_maps_to_404() {
        let (status, detail) = process_error(ProcessError::NotFound("p9".into())).into_parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(detail.message.contains("p9"));
    }

    #[test]
    fn persistence_maps_to_500() {
        let (status, detail) =
            process_error(ProcessError::Persistence(PersistenceError::unavailable("down")))
                .into_parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(detail.code, "INTERNAL_ERROR");
    }
}
