//! State Cache Port - derived, time-bounded copies of backend documents.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::Timestamp;

/// A cached document with its freshness window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedStateEntry {
    pub key: String,
    pub value: Value,
    pub cached_at: Timestamp,
    #[serde(with = "crate::domain::telemetry::duration::as_secs_f64")]
    pub ttl: Duration,
}

impl SharedStateEntry {
    pub fn new(key: impl Into<String>, value: Value, cached_at: Timestamp, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            value,
            cached_at,
            ttl,
        }
    }

    pub fn expires_at(&self) -> Timestamp {
        self.cached_at.plus(self.ttl)
    }

    /// Expiry is purely time-based.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        !now.is_before(&self.expires_at())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Cache entry could not be decoded: {0}")]
    Codec(String),
}

/// Port for the read-through cache.
///
/// Implementations may drop entries at any time; a miss is always safe.
#[async_trait]
pub trait StateCache: Send + Sync {
    /// Fetch the entry for `key`, expired or not.
    async fn get(&self, key: &str) -> Result<Option<SharedStateEntry>, CacheError>;

    async fn put(&self, entry: SharedStateEntry) -> Result<(), CacheError>;

    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;
}
