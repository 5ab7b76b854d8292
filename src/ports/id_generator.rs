//! IdGenerator port - mints ids for entities persisted without one.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::domain::process::EntityKind;

pub trait IdGenerator: Send + Sync {
    fn next_id(&self, kind: EntityKind) -> String;
}

/// Random, globally unique ids: `proc-<uuid>`, `seq-<uuid>`, `step-<uuid>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self, kind: EntityKind) -> String {
        format!("{}-{}", kind.prefix(), Uuid::new_v4())
    }
}

/// Predictable ids for tests: `proc-1`, `seq-2`, ...
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self, kind: EntityKind) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}", kind.prefix(), n)
    }
}
