//! Merge-by-id over the process collection.
//!
//! Incoming entries whose id matches an existing entry replace it in place
//! (whole entry, original position kept). Entries with a new or freshly
//! assigned id are appended in input order. Entries whose content is
//! unchanged keep their stored timestamps, so re-applying the same upsert
//! set is a no-op.

use std::collections::{HashMap, HashSet};

use super::definition::{is_unassigned, EntityKind, ProcessDefinition};
use crate::domain::foundation::Timestamp;

/// Result of one merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The full collection after the merge.
    pub collection: Vec<ProcessDefinition>,
    /// The incoming entries as persisted (ids assigned), in input order.
    pub upserted: Vec<ProcessDefinition>,
    pub inserted: usize,
    pub replaced: usize,
}

/// Fill every missing id in the process tree.
pub fn backfill_ids(process: &mut ProcessDefinition, next_id: &mut dyn FnMut(EntityKind) -> String) {
    if is_unassigned(&process.id) {
        process.id = next_id(EntityKind::Process);
    }
    for sequence in &mut process.sequences {
        if is_unassigned(&sequence.id) {
            sequence.id = next_id(EntityKind::Sequence);
        }
        for step in &mut sequence.steps {
            if is_unassigned(&step.id) {
                step.id = next_id(EntityKind::Step);
            }
        }
    }
}

/// Merge `incoming` into `existing`; incoming values win on id conflict.
pub fn merge_by_id(
    existing: Vec<ProcessDefinition>,
    incoming: Vec<ProcessDefinition>,
    next_id: &mut dyn FnMut(EntityKind) -> String,
    now: Timestamp,
) -> MergeOutcome {
    let mut collection = existing;
    for process in &mut collection {
        backfill_ids(process, next_id);
    }

    let mut positions: HashMap<String, usize> = HashMap::new();
    for (pos, process) in collection.iter().enumerate() {
        positions.entry(process.id.clone()).or_insert(pos);
    }

    let incoming = collapse_duplicates(incoming, next_id);
    let mut upserted = Vec::with_capacity(incoming.len());
    let mut inserted = 0;
    let mut replaced = 0;

    for mut entry in incoming {
        match positions.get(&entry.id).copied() {
            Some(pos) => {
                let current = &collection[pos];
                if current.same_content(&entry) {
                    upserted.push(current.clone());
                    continue;
                }
                entry.created_at = current.created_at.or(entry.created_at).or(Some(now));
                entry.updated_at = Some(now);
                upserted.push(entry.clone());
                collection[pos] = entry;
                replaced += 1;
            }
            None => {
                entry.created_at = entry.created_at.or(Some(now));
                entry.updated_at = Some(now);
                positions.insert(entry.id.clone(), collection.len());
                upserted.push(entry.clone());
                collection.push(entry);
                inserted += 1;
            }
        }
    }

    for (kind, id) in shared_child_ids(&collection) {
        tracing::warn!(level = kind.prefix(), id = %id, "Id used more than once in process collection");
    }

    MergeOutcome {
        collection,
        upserted,
        inserted,
        replaced,
    }
}

/// Sequence and step ids that appear more than once across the whole
/// collection, each reported once in first-seen order.
pub fn shared_child_ids(collection: &[ProcessDefinition]) -> Vec<(EntityKind, String)> {
    let keys = collection
        .iter()
        .flat_map(|process| &process.sequences)
        .flat_map(|sequence| {
            std::iter::once((EntityKind::Sequence, sequence.id.as_str())).chain(
                sequence
                    .steps
                    .iter()
                    .map(|step| (EntityKind::Step, step.id.as_str())),
            )
        });

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut shared = Vec::new();
    for key in keys {
        if !seen.insert(key) && reported.insert(key) {
            shared.push((key.0, key.1.to_string()));
        }
    }
    shared
}

/// Assign ids, then keep only the last entry per id, at the slot of its
/// first occurrence.
fn collapse_duplicates(
    incoming: Vec<ProcessDefinition>,
    next_id: &mut dyn FnMut(EntityKind) -> String,
) -> Vec<ProcessDefinition> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<ProcessDefinition> = Vec::with_capacity(incoming.len());
    for mut entry in incoming {
        backfill_ids(&mut entry, next_id);
        match slots.get(&entry.id) {
            Some(&slot) => unique[slot] = entry,
            None => {
                slots.insert(entry.id.clone(), unique.len());
                unique.push(entry);
            }
        }
    }
    unique
}

/// Remove the first top-level entry with `id`.
pub fn remove_by_id(collection: &mut Vec<ProcessDefinition>, id: &str) -> Option<ProcessDefinition> {
    let pos = collection.iter().position(|p| p.id == id)?;
    Some(collection.remove(pos))
}
