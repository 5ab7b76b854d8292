//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Server Ports
//!
//! - `StateBackend` - Authoritative document store
//! - `StateCache` - TTL cache in front of the backend
//! - `PushPublisher` - Broadcast to connected sessions
//!
//! ## Client Ports
//!
//! - `PushTransport` - Long-lived push stream
//! - `EventSender` - Point-to-point event submission
//!
//! ## Shared
//!
//! - `Clock`, `IdGenerator` - Injected time and id sources

mod clock;
mod id_generator;
mod push_publisher;
mod state_backend;
mod state_cache;
mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use id_generator::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use push_publisher::PushPublisher;
pub use state_backend::StateBackend;
pub use state_cache::{CacheError, SharedStateEntry, StateCache};
pub use transport::{EventSender, FrameStream, PushTransport, TransportError};
