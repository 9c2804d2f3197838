//! Session storage
//!
//! A two-layer store: a sharded in-process LRU+TTL cache (L1) and an
//! optional distributed backend (L2). Reads fall through to the remote
//! store and repopulate the local layer; writes go through to both. Remote
//! failures never surface to callers.

pub mod memory;
pub mod remote;

pub use memory::{ShardedStore, StoreStatistics};
pub use remote::{RedisBackend, RemoteBackend};

use crate::config::CacheConfig;
use crate::types::StoredSession;
use std::sync::Arc;
use std::time::Duration;

/// Two-layer session store
pub struct SessionStore {
    local: ShardedStore,
    remote: Option<Arc<dyn RemoteBackend>>,
    remote_timeout: Duration,
    ttl_secs: u64,
}

impl SessionStore {
    /// Create a local-only store
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            local: ShardedStore::new(config.max_sessions, config.shard_count, config.ttl_secs),
            remote: None,
            remote_timeout: Duration::from_millis(config.remote_timeout_ms),
            ttl_secs: config.ttl_secs,
        }
    }

    /// Create a store mirrored to a remote backend
    pub fn with_remote(config: &CacheConfig, remote: Arc<dyn RemoteBackend>) -> Self {
        Self {
            remote: Some(remote),
            ..Self::new(config)
        }
    }

    /// Look up a session, checking the local layer first
    ///
    /// A remote hit repopulates the local layer. Never an error: remote
    /// failures and corrupt remote payloads are logged and reported as a
    /// miss.
    pub async fn get(&self, handle: &str) -> Option<StoredSession> {
        if let Some(session) = self.local.get(handle) {
            return Some(session);
        }

        let remote = self.remote.as_ref()?;
        match tokio::time::timeout(self.remote_timeout, remote.fetch(handle)).await {
            Ok(Ok(Some(bytes))) => match serde_json::from_slice::<StoredSession>(&bytes) {
                Ok(mut session) => {
                    session.touch();
                    self.local.put(handle.to_string(), session.clone());
                    Some(session)
                }
                Err(error) => {
                    tracing::warn!(%handle, %error, "corrupt session payload in remote store");
                    None
                }
            },
            Ok(Ok(None)) => None,
            Ok(Err(error)) => {
                tracing::warn!(%handle, %error, "remote store read failed, serving local-only");
                None
            }
            Err(_) => {
                tracing::warn!(
                    %handle,
                    timeout_ms = self.remote_timeout.as_millis() as u64,
                    "remote store read timed out, serving local-only"
                );
                None
            }
        }
    }

    /// Insert or overwrite a session in both layers
    pub async fn put(&self, handle: &str, session: StoredSession) {
        self.local.put(handle.to_string(), session.clone());

        let Some(remote) = self.remote.as_ref() else {
            return;
        };
        let bytes = match serde_json::to_vec(&session) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(%handle, %error, "failed to encode session for remote store");
                return;
            }
        };
        match tokio::time::timeout(
            self.remote_timeout,
            remote.store(handle, &bytes, self.ttl_secs),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::warn!(%handle, %error, "remote store write failed, keeping local copy");
            }
            Err(_) => {
                tracing::warn!(
                    %handle,
                    timeout_ms = self.remote_timeout.as_millis() as u64,
                    "remote store write timed out, keeping local copy"
                );
            }
        }
    }

    /// Remove a session from both layers (used to drop corrupt entries)
    ///
    /// The remote delete is best-effort; a failed delete only means the
    /// corrupt entry lingers until its remote TTL lapses.
    pub async fn remove(&self, handle: &str) {
        self.local.remove(handle);

        let Some(remote) = self.remote.as_ref() else {
            return;
        };
        match tokio::time::timeout(self.remote_timeout, remote.delete(handle)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::warn!(%handle, %error, "remote store delete failed");
            }
            Err(_) => {
                tracing::warn!(
                    %handle,
                    timeout_ms = self.remote_timeout.as_millis() as u64,
                    "remote store delete timed out"
                );
            }
        }
    }

    /// Drop idle sessions from the local layer
    pub fn sweep(&self) -> usize {
        self.local.sweep()
    }

    /// Number of sessions in the local layer
    pub fn len(&self) -> usize {
        self.local.len()
    }

    /// Whether the local layer is empty
    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    /// Aggregate local-layer counters
    pub fn statistics(&self) -> StoreStatistics {
        self.local.statistics()
    }

    /// Whether a remote backend is attached
    pub fn distributed_enabled(&self) -> bool {
        self.remote.is_some()
    }
}
