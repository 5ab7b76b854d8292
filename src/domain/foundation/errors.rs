//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A malformed inbound unit (push frame, telemetry payload, event body).
///
/// Always recoverable: the offending unit is discarded and processing
/// continues with the next one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Empty payload")]
    Empty,

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Unrecognized valve status: {0}")]
    ValveStatus(String),

    #[error("Unrecognized progress payload: {0}")]
    Progress(String),

    #[error("Invalid duration: {0}")]
    Duration(String),
}

/// The authoritative backing store rejected or failed an operation.
///
/// Surfaced to write callers only; reads degrade instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("Backing store unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to serialize document for '{key}': {reason}")]
    Serialization { key: String, reason: String },

    #[error("Stored document for '{key}' is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
}

impl PersistenceError {
    pub fn unavailable(reason: impl ToString) -> Self {
        PersistenceError::Unavailable(reason.to_string())
    }
}

/// Failure categories a port can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Push fan-out could not reach its transport.
    TransportFailed,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::TransportFailed => "TRANSPORT_FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}
