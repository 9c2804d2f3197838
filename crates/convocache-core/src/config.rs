//! Configuration for the context cache service
//!
//! The service is always constructed from an explicit [`CacheConfig`]; there
//! are no ambient singletons, so tests can run multiple independently
//! configured instances side by side.

use crate::compress::DEFAULT_COMPRESSION_THRESHOLD;
use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};

/// Configuration for the context cache service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of sessions retained before LRU eviction
    pub max_sessions: usize,
    /// Seconds of inactivity before a session is eligible for expiry
    pub ttl_secs: u64,
    /// Byte size above which session payloads are compressed
    pub compression_threshold: usize,
    /// Number of independently locked store segments
    pub shard_count: usize,
    /// Interval between background TTL sweeps, in seconds
    pub sweep_interval_secs: u64,
    /// Mirror sessions to a remote key/value store
    pub use_remote: bool,
    /// Connection target for the remote store
    pub remote_url: String,
    /// Deadline for a single remote store call, in milliseconds
    pub remote_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_sessions: 1000,
            ttl_secs: 3600,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            shard_count: 16,
            sweep_interval_secs: 60,
            use_remote: false,
            remote_url: "redis://127.0.0.1:6379".to_string(),
            remote_timeout_ms: 150,
        }
    }
}

impl CacheConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of retained sessions
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Set the idle TTL in seconds
    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Set the compression threshold in bytes
    pub fn with_compression_threshold(mut self, threshold: usize) -> Self {
        self.compression_threshold = threshold;
        self
    }

    /// Set the number of store shards
    pub fn with_shard_count(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count;
        self
    }

    /// Set the background sweep interval in seconds
    pub fn with_sweep_interval_secs(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = secs;
        self
    }

    /// Enable the remote backend at the given URL
    pub fn with_remote(mut self, url: impl Into<String>) -> Self {
        self.use_remote = true;
        self.remote_url = url.into();
        self
    }

    /// Load configuration from process environment variables
    ///
    /// Recognized variables: `CONTEXT_CACHE_SIZE`, `CONTEXT_CACHE_TTL`,
    /// `CONTEXT_COMPRESSION_THRESHOLD`, `CONTEXT_SWEEP_INTERVAL`,
    /// `CONTEXT_REMOTE_TIMEOUT_MS`, `USE_REDIS`, `REDIS_URL`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(size) = lookup("CONTEXT_CACHE_SIZE").and_then(|v| v.parse().ok()) {
            config.max_sessions = size;
        }
        if let Some(ttl) = lookup("CONTEXT_CACHE_TTL").and_then(|v| v.parse().ok()) {
            config.ttl_secs = ttl;
        }
        if let Some(threshold) =
            lookup("CONTEXT_COMPRESSION_THRESHOLD").and_then(|v| v.parse().ok())
        {
            config.compression_threshold = threshold;
        }
        if let Some(interval) = lookup("CONTEXT_SWEEP_INTERVAL").and_then(|v| v.parse().ok()) {
            config.sweep_interval_secs = interval;
        }
        if let Some(timeout) = lookup("CONTEXT_REMOTE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.remote_timeout_ms = timeout;
        }
        if let Some(flag) = lookup("USE_REDIS") {
            config.use_remote = matches!(flag.to_lowercase().as_str(), "true" | "1");
        }
        if let Some(url) = lookup("REDIS_URL") {
            config.remote_url = url;
        }

        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> CacheResult<()> {
        if self.max_sessions == 0 {
            return Err(CacheError::config("max_sessions must be greater than 0"));
        }
        if self.shard_count == 0 {
            return Err(CacheError::config("shard_count must be greater than 0"));
        }
        if self.ttl_secs == 0 {
            return Err(CacheError::config("ttl_secs must be greater than 0"));
        }
        Ok(())
    }
}
