//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers and error types that form the
//! vocabulary of the rig dashboard domain.

mod errors;
mod ids;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ParseError, PersistenceError, ValidationError};
pub use ids::ClientId;
pub use timestamp::Timestamp;
