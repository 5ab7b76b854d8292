//! State Backend Port - the authoritative key/value document store.
//!
//! The shared-state cache sits in front of this port; whatever is stored
//! here wins once a cache entry expires.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::foundation::PersistenceError;

/// Port for persisting shared documents by key.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Load the document stored under `key`.
    ///
    /// # Returns
    /// `Ok(None)` when nothing has been stored yet.
    ///
    /// # Errors
    /// Returns `PersistenceError` if the store cannot be read.
    async fn load(&self, key: &str) -> Result<Option<Value>, PersistenceError>;

    /// Replace the document stored under `key`.
    ///
    /// # Errors
    /// Returns `PersistenceError` if the write was not durably applied.
    async fn store(&self, key: &str, value: &Value) -> Result<(), PersistenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn StateBackend) {}
}
