//! Domain layer: pure types and algorithms, no I/O.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, timestamps, errors)
//! - `telemetry` - Normalization of raw valve and progress telemetry
//! - `rig` - The canonical rig state document and its partial updates
//! - `process` - Process definitions and merge-by-id reconciliation
//! - `sync` - Event kinds, push messages, backoff and session bookkeeping

pub mod foundation;
pub mod process;
pub mod rig;
pub mod sync;
pub mod telemetry;
