//! Cache-aside shared-state store.
//!
//! Reads favor availability: they are served from the cache, then the
//! backend, then an expired cache entry, then a default, and never fail.
//! Writes favor consistency: the backend is written first and the cache
//! only follows a successful backend write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::domain::foundation::PersistenceError;
use crate::ports::{Clock, SharedStateEntry, StateBackend, StateCache};

/// Where a read was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// Unexpired cache entry.
    Cache,
    /// Read through from the backend.
    Store,
    /// Backend failed; an expired cache entry was served.
    Stale,
    /// Backend failed and nothing was cached.
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    /// `None` when the key has never been written (or on `Default`).
    pub value: Option<Value>,
    pub freshness: Freshness,
}

pub struct StateStore {
    backend: Arc<dyn StateBackend>,
    cache: Arc<dyn StateCache>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    key_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl StateStore {
    pub fn new(
        backend: Arc<dyn StateBackend>,
        cache: Arc<dyn StateCache>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            backend,
            cache,
            clock,
            ttl,
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Best-effort read. Never fails.
    pub async fn get(&self, key: &str) -> StateSnapshot {
        let now = self.clock.now();

        let cached = match self.cache.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed, treating as miss");
                None
            }
        };

        if let Some(entry) = &cached {
            if !entry.is_expired(now) {
                return StateSnapshot {
                    value: Some(entry.value.clone()),
                    freshness: Freshness::Cache,
                };
            }
        }

        match self.backend.load(key).await {
            Ok(Some(value)) => {
                self.fill_cache(key, value.clone()).await;
                StateSnapshot {
                    value: Some(value),
                    freshness: Freshness::Store,
                }
            }
            Ok(None) => StateSnapshot {
                value: None,
                freshness: Freshness::Store,
            },
            Err(e) => match cached {
                Some(entry) => {
                    tracing::warn!(key, error = %e, "Backend read failed, serving expired cache entry");
                    StateSnapshot {
                        value: Some(entry.value),
                        freshness: Freshness::Stale,
                    }
                }
                None => {
                    tracing::warn!(key, error = %e, "Backend read failed, serving default");
                    StateSnapshot {
                        value: None,
                        freshness: Freshness::Default,
                    }
                }
            },
        }
    }

    /// Write through to the backend, then refresh the cache.
    ///
    /// On backend failure the cache is not touched and the error is returned.
    pub async fn set(&self, key: &str, value: Value) -> Result<(), PersistenceError> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;
        self.write(key, value).await
    }

    /// Atomic read-modify-write of one key within this process.
    ///
    /// `f` receives the current backend document (`None` if never written)
    /// and returns the new document plus a result. The read is strict: a
    /// backend read failure aborts the update without calling `f`.
    pub async fn update<T, E, F>(&self, key: &str, f: F) -> Result<T, E>
    where
        F: FnOnce(Option<Value>) -> Result<(Value, T), E>,
        E: From<PersistenceError>,
    {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        let current = self.backend.load(key).await?;
        let (next, result) = f(current)?;
        self.write(key, next).await?;
        Ok(result)
    }

    /// Drop the cached copy of `key`.
    pub async fn invalidate(&self, key: &str) {
        if let Err(e) = self.cache.invalidate(key).await {
            tracing::warn!(key, error = %e, "Cache invalidation failed");
        }
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), PersistenceError> {
        if let Err(e) = self.backend.store(key, &value).await {
            tracing::error!(key, error = %e, "Backend write failed");
            return Err(e);
        }
        self.fill_cache(key, value).await;
        tracing::debug!(key, "Stored shared state");
        Ok(())
    }

    async fn fill_cache(&self, key: &str, value: Value) {
        let entry = SharedStateEntry::new(key, value, self.clock.now(), self.ttl);
        if let Err(e) = self.cache.put(entry).await {
            tracing::warn!(key, error = %e, "Cache fill failed");
            // A stale copy must not outlive a newer backend value.
            self.invalidate(key).await;
        }
    }

    fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.to_string()).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cache::InMemoryStateCache;
    use crate::adapters::storage::InMemoryStateBackend;
    use crate::ports::{CacheError, ManualClock};
    use async_trait::async_trait;
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(300);

    struct Fixture {
        backend: Arc<InMemoryStateBackend>,
        cache: Arc<InMemoryStateCache>,
        clock: Arc<ManualClock>,
        store: StateStore,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(InMemoryStateBackend::new());
        let cache = Arc::new(InMemoryStateCache::new());
        let clock = Arc::new(ManualClock::default());
        let store = StateStore::new(backend.clone(), cache.clone(), clock.clone(), TTL);
        Fixture {
            backend,
            cache,
            clock,
            store,
        }
    }

    #[tokio::test]
    async fn read_through_then_cached() {
        let f = fixture();
        f.backend.store("k", &json!({"v": 1})).await.unwrap();

        let first = f.store.get("k").await;
        assert_eq!(first.freshness, Freshness::Store);
        assert_eq!(first.value, Some(json!({"v": 1})));

        let second = f.store.get("k").await;
        assert_eq!(second.freshness, Freshness::Cache);
        assert_eq!(f.backend.read_count(), 1);
    }

    #[tokio::test]
    async fn missing_key_is_not_cached() {
        let f = fixture();
        let snapshot = f.store.get("nothing").await;
        assert_eq!(snapshot.value, None);
        assert_eq!(snapshot.freshness, Freshness::Store);
        assert!(f.cache.is_empty().await);
    }

    #[tokio::test]
    async fn unexpired_entry_served_even_if_backend_changed() {
        let f = fixture();
        f.store.set("k", json!(1)).await.unwrap();
        // Another process writes behind our back.
        f.backend.store("k", &json!(2)).await.unwrap();

        f.clock.advance(TTL - Duration::from_secs(1));
        assert_eq!(f.store.get("k").await.value, Some(json!(1)));

        f.clock.advance(Duration::from_secs(1));
        let after = f.store.get("k").await;
        assert_eq!(after.value, Some(json!(2)));
        assert_eq!(after.freshness, Freshness::Store);
    }

    #[tokio::test]
    async fn backend_outage_serves_stale_then_default() {
        let f = fixture();
        f.store.set("k", json!("old")).await.unwrap();
        f.clock.advance(TTL * 2);
        f.backend.set_fail_reads(true);

        let stale = f.store.get("k").await;
        assert_eq!(stale.freshness, Freshness::Stale);
        assert_eq!(stale.value, Some(json!("old")));

        let default = f.store.get("other").await;
        assert_eq!(default.freshness, Freshness::Default);
        assert_eq!(default.value, None);
    }

    #[tokio::test]
    async fn failed_write_leaves_cache_untouched() {
        let f = fixture();
        f.store.set("k", json!("committed")).await.unwrap();

        f.backend.set_fail_writes(true);
        assert!(f.store.set("k", json!("rejected")).await.is_err());

        assert_eq!(f.store.get("k").await.value, Some(json!("committed")));
        assert_eq!(f.backend.snapshot("k").await, Some(json!("committed")));
    }

    #[tokio::test]
    async fn update_is_strict_on_read_failure() {
        let f = fixture();
        f.backend.set_fail_reads(true);

        let mut called = false;
        let result: Result<(), PersistenceError> = f
            .store
            .update("k", |_| {
                called = true;
                Ok((json!(1), ()))
            })
            .await;

        assert!(result.is_err());
        assert!(!called);
    }

    #[tokio::test]
    async fn concurrent_updates_do_not_lose_increments() {
        let f = fixture();
        let store = Arc::new(f.store);

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .update("counter", |current| {
                        let n = current.and_then(|v| v.as_u64()).unwrap_or(0);
                        Ok::<_, PersistenceError>((json!(n + 1), ()))
                    })
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(f.backend.snapshot("counter").await, Some(json!(20)));
    }

    struct BrokenCache;

    #[async_trait]
    impl StateCache for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<SharedStateEntry>, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn put(&self, _entry: SharedStateEntry) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn invalidate(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn cache_outage_never_fails_requests() {
        let backend = Arc::new(InMemoryStateBackend::new());
        let store = StateStore::new(
            backend.clone(),
            Arc::new(BrokenCache),
            Arc::new(ManualClock::default()),
            TTL,
        );

        store.set("k", json!(7)).await.unwrap();
        let snapshot = store.get("k").await;
        assert_eq!(snapshot.value, Some(json!(7)));
        assert_eq!(snapshot.freshness, Freshness::Store);
    }
}
