//! Sharded in-process session storage
//!
//! The key space is partitioned by a prefix of the handle across
//! independently locked segments, so unrelated handles never contend. Each
//! shard holds its own LRU bookkeeping; global capacity is the sum of shard
//! capacities.

use crate::types::StoredSession;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroUsize;

/// Counters for one storage layer
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStatistics {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Sessions evicted under capacity pressure
    pub evictions: u64,
    /// Sessions dropped by TTL expiry
    pub expirations: u64,
}

struct Shard {
    entries: LruCache<String, StoredSession>,
    stats: StoreStatistics,
}

/// Concurrent, bounded, time-limited local session store
pub struct ShardedStore {
    shards: Vec<Mutex<Shard>>,
    ttl_secs: u64,
}

impl ShardedStore {
    /// Create a store with `capacity` total slots spread over `shard_count`
    /// segments
    pub fn new(capacity: usize, shard_count: usize, ttl_secs: u64) -> Self {
        let shard_count = shard_count.max(1);
        let per_shard = capacity.div_ceil(shard_count).max(1);
        let per_shard = NonZeroUsize::new(per_shard).expect("per-shard capacity is at least 1");

        let shards = (0..shard_count)
            .map(|_| {
                Mutex::new(Shard {
                    entries: LruCache::new(per_shard),
                    stats: StoreStatistics::default(),
                })
            })
            .collect();

        Self { shards, ttl_secs }
    }

    fn shard_for(&self, handle: &str) -> &Mutex<Shard> {
        // Handles are hex, so the leading two digits decode to a uniform
        // 0-255 prefix; raw ASCII bytes would only cover 16 values and
        // leave shards idle. Non-hex keys fall back to a byte sum.
        let prefix = handle
            .get(..2)
            .and_then(|digits| u8::from_str_radix(digits, 16).ok())
            .unwrap_or_else(|| handle.bytes().fold(0u8, |acc, b| acc.wrapping_add(b)));
        let index = prefix as usize % self.shards.len();
        &self.shards[index]
    }

    fn is_expired(&self, session: &StoredSession) -> bool {
        session.idle_secs() > self.ttl_secs as i64
    }

    /// Look up a session, refreshing its recency on hit
    ///
    /// An expired entry is removed and reported as a miss. Never an error.
    pub fn get(&self, handle: &str) -> Option<StoredSession> {
        let mut shard = self.shard_for(handle).lock();

        let expired = match shard.entries.peek(handle) {
            Some(session) => self.is_expired(session),
            None => {
                shard.stats.misses += 1;
                return None;
            }
        };

        if expired {
            shard.entries.pop(handle);
            shard.stats.expirations += 1;
            shard.stats.misses += 1;
            return None;
        }

        let session = shard.entries.get_mut(handle).map(|session| {
            session.touch();
            session.clone()
        });
        shard.stats.hits += 1;
        session
    }

    /// Insert or overwrite a session, evicting within the shard if full
    pub fn put(&self, handle: String, session: StoredSession) {
        let mut shard = self.shard_for(&handle).lock();
        if let Some((displaced, _)) = shard.entries.push(handle.clone(), session) {
            // push returns the replaced entry on overwrite and the
            // least-recently-used entry on eviction
            if displaced != handle {
                shard.stats.evictions += 1;
            }
        }
    }

    /// Remove a session (used to drop corrupt entries)
    pub fn remove(&self, handle: &str) {
        let mut shard = self.shard_for(handle).lock();
        shard.entries.pop(handle);
    }

    /// Drop all entries idle past the TTL; returns how many were removed
    ///
    /// Locks one shard at a time so in-flight get/put calls on other shards
    /// are never blocked.
    pub fn sweep(&self) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = shard.lock();
            let expired: Vec<String> = shard
                .entries
                .iter()
                .filter(|(_, session)| self.is_expired(session))
                .map(|(handle, _)| handle.clone())
                .collect();
            for handle in expired {
                shard.entries.pop(&handle);
                shard.stats.expirations += 1;
                removed += 1;
            }
        }
        removed
    }

    /// Number of sessions currently stored
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().entries.len()).sum()
    }

    /// Whether the store holds no sessions
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aggregate counters across all shards
    pub fn statistics(&self) -> StoreStatistics {
        let mut total = StoreStatistics::default();
        for shard in &self.shards {
            let shard = shard.lock();
            total.hits += shard.stats.hits;
            total.misses += shard.stats.misses;
            total.evictions += shard.stats.evictions;
            total.expirations += shard.stats.expirations;
        }
        total
    }
}
