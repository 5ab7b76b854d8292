//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the application to external systems:
//! - `storage` - Authoritative state backends (memory, YAML files, PostgreSQL)
//! - `cache` - TTL caches in front of the backend (memory, Redis)
//! - `websocket` - Server-side push hub and socket handler
//! - `events` - Test publisher that records broadcasts
//! - `http` - axum routes and the application router
//! - `transport` - Client-side push/submit transports

pub mod cache;
pub mod events;
pub mod http;
pub mod storage;
pub mod transport;
pub mod websocket;
