//! WebSocket push channel, server side.
//!
//! ```text
//! SubmitEventHandler / IngestTelemetryHandler
//!                 │ publish
//!                 ▼
//!             PushHub ── broadcast ──► ws_handler (one task pair per socket)
//! ```
//!
//! # Components
//!
//! - [`hub`] - Connected-session registry and broadcast fan-out
//! - [`handler`] - Axum WebSocket upgrade handler

pub mod handler;
pub mod hub;

pub use handler::{websocket_router, ws_handler, WebSocketState};
pub use hub::PushHub;
