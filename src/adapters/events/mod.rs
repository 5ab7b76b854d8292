//! Push publisher adapters besides the websocket hub.
//!
//! - `RecordingPushPublisher` - Captures broadcasts for test assertions

mod recording;

pub use recording::RecordingPushPublisher;
