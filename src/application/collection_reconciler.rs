//! Process collection service over the shared-state store.
//!
//! Every write is one read-modify-write of the whole collection under the
//! store's per-key lock, so a merge is never visible half applied.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::state_store::{Freshness, StateStore};
use crate::domain::foundation::{ParseError, PersistenceError};
use crate::domain::process::{merge_by_id, remove_by_id, EntityKind, ProcessDefinition};
use crate::ports::{Clock, IdGenerator};

/// Storage key of the process collection.
pub const PROCESSES_KEY: &str = "processes";

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Process not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertResult {
    /// Full collection after the merge.
    pub processes: Vec<ProcessDefinition>,
    /// Submitted entries as stored, ids assigned.
    pub upserted: Vec<ProcessDefinition>,
    pub inserted: usize,
    pub replaced: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteResult {
    pub removed: usize,
    pub processes: Vec<ProcessDefinition>,
}

pub struct CollectionReconciler {
    store: Arc<StateStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl CollectionReconciler {
    pub fn new(store: Arc<StateStore>, ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self { store, ids, clock }
    }

    /// Current collection. Never fails; an unreadable document reads as empty.
    ///
    /// Entries persisted before ids were enforced are returned as stored;
    /// ids are only assigned by a write.
    pub async fn list(&self) -> (Vec<ProcessDefinition>, Freshness) {
        let snapshot = self.store.get(PROCESSES_KEY).await;
        let processes = match snapshot.value {
            Some(value) => decode(value).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Stored process collection unreadable, serving empty");
                Vec::new()
            }),
            None => Vec::new(),
        };
        (processes, snapshot.freshness)
    }

    /// Merge `incoming` into the stored collection by id.
    pub async fn upsert(&self, incoming: Vec<ProcessDefinition>) -> Result<UpsertResult, ProcessError> {
        let now = self.clock.now();
        let ids = self.ids.clone();

        let result = self
            .store
            .update(PROCESSES_KEY, move |current| {
                let existing = current.map(decode).transpose()?.unwrap_or_default();
                let mut next_id = |kind: EntityKind| ids.next_id(kind);
                let outcome = merge_by_id(existing, incoming, &mut next_id, now);
                let value = encode(&outcome.collection)?;
                Ok::<_, ProcessError>((
                    value,
                    UpsertResult {
                        processes: outcome.collection,
                        upserted: outcome.upserted,
                        inserted: outcome.inserted,
                        replaced: outcome.replaced,
                    },
                ))
            })
            .await?;

        tracing::info!(
            inserted = result.inserted,
            replaced = result.replaced,
            total = result.processes.len(),
            "Upserted processes"
        );
        Ok(result)
    }

    /// Remove the entry with `id`. A miss leaves the collection untouched.
    pub async fn delete(&self, id: &str) -> Result<DeleteResult, ProcessError> {
        let id = id.to_string();
        let result = self
            .store
            .update(PROCESSES_KEY, move |current| {
                let mut processes = current.map(decode).transpose()?.unwrap_or_default();
                if remove_by_id(&mut processes, &id).is_none() {
                    return Err(ProcessError::NotFound(id));
                }
                let value = encode(&processes)?;
                Ok((value, DeleteResult { removed: 1, processes }))
            })
            .await?;
        tracing::info!(remaining = result.processes.len(), "Deleted process");
        Ok(result)
    }

    /// Clear the collection, reporting how many entries were removed.
    pub async fn delete_all(&self) -> Result<DeleteResult, ProcessError> {
        let result = self
            .store
            .update(PROCESSES_KEY, |current| {
                let removed = current.map(decode).transpose()?.map_or(0, |p| p.len());
                Ok::<_, ProcessError>((
                    Value::Array(Vec::new()),
                    DeleteResult {
                        removed,
                        processes: Vec::new(),
                    },
                ))
            })
            .await?;
        tracing::info!(removed = result.removed, "Cleared process collection");
        Ok(result)
    }
}

fn decode(value: Value) -> Result<Vec<ProcessDefinition>, PersistenceError> {
    serde_json::from_value(value).map_err(|e| PersistenceError::Corrupt {
        key: PROCESSES_KEY.to_string(),
        reason: e.to_string(),
    })
}

fn encode(processes: &[ProcessDefinition]) -> Result<Value, PersistenceError> {
    serde_json::to_value(processes).map_err(|e| PersistenceError::Serialization {
        key: PROCESSES_KEY.to_string(),
        reason: e.to_string(),
    })
}
