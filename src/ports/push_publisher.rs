//! PushPublisher port - fan-out of broadcasts to connected sessions.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::sync::PushMessage;

/// Port for broadcasting a message on the push channel.
///
/// Delivery is best effort: sessions that are not connected at publish
/// time never see the message.
#[async_trait]
pub trait PushPublisher: Send + Sync {
    async fn publish(&self, message: PushMessage) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn PushPublisher) {}
}
