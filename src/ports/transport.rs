//! Client transport ports.
//!
//! - `PushTransport` opens the long-lived server → client stream
//! - `EventSender` submits one event point to point

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::domain::foundation::ClientId;
use crate::domain::sync::PendingEvent;

/// Channel or request failure. Always recoverable by reconnect or re-queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Channel closed")]
    Closed,

    #[error("Not connected")]
    NotConnected,

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Server rejected event with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Raw text frames of one push connection. The stream ends when the
/// connection closes.
pub type FrameStream = BoxStream<'static, Result<String, TransportError>>;

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn open(&self, client_id: &ClientId) -> Result<FrameStream, TransportError>;
}

#[async_trait]
pub trait EventSender: Send + Sync {
    async fn send(&self, event: &PendingEvent) -> Result<(), TransportError>;
}
