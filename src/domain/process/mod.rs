//! Process definitions and the merge-by-id reconciliation over them.

mod definition;
mod reconciler;

pub use definition::{
    is_unassigned, EntityKind, ProcessDefinition, ProcessSubmission, SequenceDefinition,
    StepDefinition,
};
pub use reconciler::{backfill_ids, merge_by_id, remove_by_id, shared_child_ids, MergeOutcome};
