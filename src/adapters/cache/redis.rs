//! Redis-backed cache for multi-server deployments.
//!
//! Entries are stored as JSON under `<prefix><key>` with `SET .. EX ttl`,
//! so Redis evicts them on expiry and a stale copy is never available
//! from this adapter.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::ports::{CacheError, SharedStateEntry, StateCache};

const DEFAULT_PREFIX: &str = "rig-dashboard:state:";

#[derive(Clone)]
pub struct RedisStateCache {
    conn: MultiplexedConnection,
    prefix: String,
}

impl RedisStateCache {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Open a multiplexed connection to `url`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|e| CacheError::Unavailable(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(Self::new(conn))
    }

    fn redis_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl StateCache for RedisStateCache {
    async fn get(&self, key: &str) -> Result<Option<SharedStateEntry>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(self.redis_key(key))
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        raw.map(|json| serde_json::from_str(&json).map_err(|e| CacheError::Codec(e.to_string())))
            .transpose()
    }

    async fn put(&self, entry: SharedStateEntry) -> Result<(), CacheError> {
        let json = serde_json::to_string(&entry).map_err(|e| CacheError::Codec(e.to_string()))?;
        let ttl_secs = entry.ttl.as_secs().max(1);
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(self.redis_key(&entry.key))
            .arg(json)
            .arg("EX")
            .arg(ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.redis_key(key))
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }
}
