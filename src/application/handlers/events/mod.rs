//! Client event submission.

mod submit_event;

pub use submit_event::{SubmitEventCommand, SubmitEventError, SubmitEventHandler, SubmitEventResult};
