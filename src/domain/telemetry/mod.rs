//! Telemetry normalization.
//!
//! Pure functions that turn the heterogeneous encodings arriving from the
//! message bus into canonical valve and progress state. Nothing here does
//! I/O; malformed input surfaces as [`ParseError`](crate::domain::foundation::ParseError)
//! and the caller discards the unit.

pub mod duration;
mod progress;
mod topic;
mod valve;

pub use duration::parse_duration;
pub use progress::{parse_progress, progress_fraction, ProgressState, PROGRESS_FLOOR};
pub use topic::{TelemetryMessage, TelemetryTopic};
pub use valve::{
    describe, normalize_valve, parse_position_code, parse_status_line, ValveFlag, ValveSource,
    ValveState, ValveTelemetry,
};
