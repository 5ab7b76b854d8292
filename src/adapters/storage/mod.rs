//! Storage Adapters
//!
//! Implementations of the StateBackend port.
//!
//! ## Available Adapters
//!
//! - **InMemoryStateBackend** - Documents in memory (testing/development)
//! - **FileStateBackend** - One YAML file per key on disk
//! - **PostgresStateBackend** - JSONB rows in PostgreSQL
//!
//! ## Usage
//!
//! ```ignore
//! use adapters::storage::{FileStateBackend, InMemoryStateBackend};
//!
//! // Single-node deployment: file-based storage
//! let backend = FileStateBackend::new("./data/state");
//!
//! // Testing: in-memory storage
//! let backend = InMemoryStateBackend::new();
//! ```

mod file_state_backend;
mod in_memory_state_backend;
mod postgres_state_backend;

pub use file_state_backend::FileStateBackend;
pub use in_memory_state_backend::InMemoryStateBackend;
pub use postgres_state_backend::PostgresStateBackend;
