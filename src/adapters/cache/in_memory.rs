//! In-process cache of shared documents.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::ports::{CacheError, SharedStateEntry, StateCache};

/// Map-backed cache. Expired entries are kept until overwritten so the
/// store can still serve them when the backend is down.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateCache {
    entries: Arc<RwLock<HashMap<String, SharedStateEntry>>>,
}

impl InMemoryStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl StateCache for InMemoryStateCache {
    async fn get(&self, key: &str) -> Result<Option<SharedStateEntry>, CacheError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, entry: SharedStateEntry) -> Result<(), CacheError> {
        self.entries.write().await.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn put_get_invalidate() {
        let cache = InMemoryStateCache::new();
        let entry = SharedStateEntry::new("k", json!(1), Timestamp::now(), Duration::from_secs(5));
        cache.put(entry.clone()).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(entry));

        cache.invalidate("k").await.unwrap();
        assert!(cache.is_empty().await);
    }
}
