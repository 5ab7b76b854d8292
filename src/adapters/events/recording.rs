//! Recording push publisher for tests.
//!
//! Captures every published message for assertions instead of delivering
//! it anywhere.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::sync::{EventKind, PushMessage};
use crate::ports::PushPublisher;

/// Publisher that remembers what it was asked to broadcast.
///
/// # Example
///
/// ```ignore
/// let publisher = Arc::new(RecordingPushPublisher::new());
/// handler.handle(cmd).await?;
/// assert!(publisher.has_kind(EventKind::PumpUpdate));
/// ```
#[derive(Default)]
pub struct RecordingPushPublisher {
    published: RwLock<Vec<PushMessage>>,
    fail: AtomicBool,
}

impl RecordingPushPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail (nothing is recorded).
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    // === Test Helpers ===

    pub fn published(&self) -> Vec<PushMessage> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<PushMessage> {
        self.published()
            .into_iter()
            .filter(|m| m.kind == kind)
            .collect()
    }

    pub fn has_kind(&self, kind: EventKind) -> bool {
        !self.of_kind(kind).is_empty()
    }

    pub fn count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn clear(&self) {
        self.published
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl PushPublisher for RecordingPushPublisher {
    async fn publish(&self, message: PushMessage) -> Result<(), DomainError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(
                DomainError::new(ErrorCode::TransportFailed, "injected publish failure")
                    .with_detail("event_type", message.kind.to_string()),
            );
        }
        self.published
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use serde_json::json;

    #[tokio::test]
    async fn records_in_publish_order() {
        let publisher = RecordingPushPublisher::new();
        for kind in [EventKind::PumpUpdate, EventKind::ValveUpdate] {
            publisher
                .publish(PushMessage::new(kind, json!({}), Timestamp::now()))
                .await
                .unwrap();
        }
        assert_eq!(publisher.count(), 2);
        assert_eq!(publisher.published()[1].kind, EventKind::ValveUpdate);
        assert!(publisher.has_kind(EventKind::PumpUpdate));
        assert!(!publisher.has_kind(EventKind::TankUpdate));
    }

    #[tokio::test]
    async fn injected_failure_records_nothing() {
        let publisher = RecordingPushPublisher::new();
        publisher.set_fail(true);
        let result = publisher
            .publish(PushMessage::new(EventKind::PumpUpdate, json!({}), Timestamp::now()))
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.details.get("event_type").map(String::as_str), Some("pump/update"));
        assert_eq!(publisher.count(), 0);
    }
}
