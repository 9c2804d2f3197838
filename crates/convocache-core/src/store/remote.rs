//! Distributed session backend
//!
//! Mirrors sessions to a remote key/value service so that multiple
//! processes can resolve each other's handles. The remote store is strictly
//! best-effort: every call is bounded by a timeout, and any failure degrades
//! to local-only semantics.

use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;

/// Key prefix for session entries in the remote store
const KEY_PREFIX: &str = "ctx:";

/// Remote key/value backend for session payloads
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Fetch a stored payload; `None` on unknown key
    async fn fetch(&self, handle: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store a payload with the given TTL
    async fn store(&self, handle: &str, payload: &[u8], ttl_secs: u64) -> CacheResult<()>;

    /// Delete a stored payload (used to purge corrupt entries)
    async fn delete(&self, handle: &str) -> CacheResult<()>;
}

/// Redis-backed remote store
pub struct RedisBackend {
    manager: redis::aio::ConnectionManager,
}

impl RedisBackend {
    /// Connect to a Redis instance
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::remote(format!("invalid redis url: {e}")))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::remote(format!("redis connection failed: {e}")))?;
        Ok(Self { manager })
    }

    fn key(handle: &str) -> String {
        format!("{KEY_PREFIX}{handle}")
    }
}

#[async_trait]
impl RemoteBackend for RedisBackend {
    async fn fetch(&self, handle: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        redis::cmd("GET")
            .arg(Self::key(handle))
            .query_async::<Option<Vec<u8>>>(&mut conn)
            .await
            .map_err(|e| CacheError::remote(e.to_string()))
    }

    async fn store(&self, handle: &str, payload: &[u8], ttl_secs: u64) -> CacheResult<()> {
        let mut conn = self.manager.clone();
        redis::cmd("SETEX")
            .arg(Self::key(handle))
            .arg(ttl_secs)
            .arg(payload)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::remote(e.to_string()))
    }

    async fn delete(&self, handle: &str) -> CacheResult<()> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(Self::key(handle))
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| CacheError::remote(e.to_string()))?;
        Ok(())
    }
}
