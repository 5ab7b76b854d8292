//! Shared HTTP error body.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

/// Code and message of a failed request.
///
/// Endpoints with a collection or document body flatten this next to their
/// usual fields so a failure still carries an empty-but-valid payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn not_found(resource_type: &str, id: &str) -> Self {
        Self::new("NOT_FOUND", format!("{} not found: {}", resource_type, id))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Body for endpoints with nothing else to return.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    #[serde(flatten)]
    pub error: ErrorDetail,
}

impl From<ErrorDetail> for ErrorResponse {
    fn from(error: ErrorDetail) -> Self {
        Self {
            success: false,
            error,
        }
    }
}

/// Error half of every JSON endpoint.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound { resource: &'static str, id: String },
    Internal(String),
}

impl ApiError {
    /// Status and body detail, for handlers that wrap the detail in their own DTO.
    pub fn into_parts(self) -> (StatusCode, ErrorDetail) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorDetail::bad_request(msg)),
            ApiError::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                ErrorDetail::not_found(resource, &id)
                    .with_details(json!({ "resource": resource, "id": id })),
            ),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorDetail::internal(msg))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.into_parts();
        (status, Json(ErrorResponse::from(detail))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
