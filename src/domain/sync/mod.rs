//! Synchronization protocol types shared by the push hub and the client.

mod backoff;
mod event;
mod session;

pub use backoff::BackoffPolicy;
pub use event::{EventKind, PendingEvent, PushMessage};
pub use session::{ClientSession, ConnectionState};
