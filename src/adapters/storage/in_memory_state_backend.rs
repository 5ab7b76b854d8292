//! In-Memory State Backend Adapter
//!
//! Stores documents in memory. Useful for testing and development; the
//! failure toggles let tests exercise the degraded read path and the
//! loud write path.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::PersistenceError;
use crate::ports::StateBackend;

/// In-memory backing store for shared documents
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateBackend {
    documents: Arc<RwLock<HashMap<String, Value>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    reads: Arc<AtomicUsize>,
}

impl InMemoryStateBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `load` fail until reset.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `store` fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `load` calls that reached the store.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Direct view of what is stored, bypassing failure injection.
    pub async fn snapshot(&self, key: &str) -> Option<Value> {
        self.documents.read().await.get(key).cloned()
    }
}

#[async_trait]
impl StateBackend for InMemoryStateBackend {
    async fn load(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PersistenceError::unavailable("injected read failure"));
        }
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn store(&self, key: &str, value: &Value) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::unavailable("injected write failure"));
        }
        self.documents
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }
}
