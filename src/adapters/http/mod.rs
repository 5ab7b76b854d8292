//! HTTP adapters - REST API implementations.
//!
//! Each concern has its own adapter (dto / handlers / routes); [`router`]
//! composes them with the push socket into the application router.

pub mod error;
pub mod events;
pub mod processes;
pub mod rig_state;
pub mod router;
pub mod telemetry;

pub use error::{ApiError, ErrorDetail, ErrorResponse};
pub use router::{app_router, AppServices, RouterSettings};
