//! Cache Adapters
//!
//! - **InMemoryStateCache** - Per-process map (single node, tests)
//! - **RedisStateCache** - Shared cache for multi-server deployments

mod in_memory;
mod redis;

pub use self::in_memory::InMemoryStateCache;
pub use self::redis::RedisStateCache;
