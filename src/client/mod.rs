//! Client side of the sync engine.
//!
//! - [`EventChannel`] - Connection manager: reconnect, outbound queue, inbound dispatch
//! - [`EventBus`] - Typed listener registry with self-echo suppression
//! - [`ClientIdentity`] - Client id that persists across restarts
//!
//! ```ignore
//! let id = ClientIdentity::load_or_create(&config.sync.identity_path).await?;
//! let channel = EventChannel::new(id, transport, sender, clock, settings);
//! channel.bus().on(EventKind::PumpUpdate, listener);
//! channel.connect();
//! channel.send_event(EventKind::PumpUpdate, json!({"pumpId": "p3", "status": "ON"})).await;
//! ```

pub mod event_bus;
pub mod event_channel;
pub mod identity;

pub use event_bus::{DispatchReport, EventBus, EventListener, ListenerError};
pub use event_channel::{ChannelSettings, EventChannel, SendOutcome};
pub use identity::{ClientIdentity, IdentityError};
