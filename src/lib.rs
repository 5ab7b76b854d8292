//! Rig Dashboard - multi-session sync engine for a process rig.
//!
//! The server keeps one shared rig state document and a process collection
//! behind a cache-aside store, normalizes raw telemetry into that document
//! and fans every change out to connected dashboard sessions. The client
//! side keeps one push channel per session alive, queues events while the
//! link is down and replays them in order once it returns.

pub mod adapters;
pub mod application;
pub mod client;
pub mod config;
pub mod domain;
pub mod ports;
