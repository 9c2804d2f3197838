//! Context cache service
//!
//! Orchestrates handle generation, compression, pruning and session storage
//! behind the two operations the chat endpoint consumes: `resolve` (handle
//! or client history → effective prior turns) and `commit` (prior turns +
//! new exchange → pruned, stored, re-handled state).
//!
//! Every failure mode is recovered locally: a degraded cache only ever
//! costs context continuity, never a request failure.

use crate::compress::{decompress, maybe_compress};
use crate::config::CacheConfig;
use crate::error::CacheResult;
use crate::estimator::TokenEstimator;
use crate::handle::HandleGenerator;
use crate::pruner::HistoryPruner;
use crate::store::{RedisBackend, RemoteBackend, SessionStore};
use crate::types::{CacheStats, CommitOutcome, HistorySource, Session, StoredSession, Turn};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Conversation context cache service
pub struct ContextCacheService {
    config: CacheConfig,
    store: Arc<SessionStore>,
    estimator: TokenEstimator,
    pruner: HistoryPruner,
    handles: HandleGenerator,
    shutdown_token: CancellationToken,
    sweep_task: Mutex<Option<JoinHandle<()>>>,
}

impl ContextCacheService {
    /// Create a service from the given configuration
    ///
    /// When the remote backend is enabled but unreachable, the service
    /// starts local-only rather than failing.
    pub async fn new(config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;

        let store = if config.use_remote {
            match RedisBackend::connect(&config.remote_url).await {
                Ok(backend) => {
                    tracing::info!(url = %config.remote_url, "remote session backend enabled");
                    SessionStore::with_remote(&config, Arc::new(backend))
                }
                Err(error) => {
                    tracing::warn!(
                        url = %config.remote_url,
                        %error,
                        "remote backend connection failed, falling back to local-only store"
                    );
                    SessionStore::new(&config)
                }
            }
        } else {
            SessionStore::new(&config)
        };

        Ok(Self::from_store(config, store))
    }

    /// Create a service over an explicit remote backend
    pub fn with_backend(config: CacheConfig, backend: Arc<dyn RemoteBackend>) -> CacheResult<Self> {
        config.validate()?;
        let store = SessionStore::with_remote(&config, backend);
        Ok(Self::from_store(config, store))
    }

    /// Create a local-only service
    pub fn local(config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;
        let store = SessionStore::new(&config);
        Ok(Self::from_store(config, store))
    }

    fn from_store(config: CacheConfig, store: SessionStore) -> Self {
        let store = Arc::new(store);
        let shutdown_token = CancellationToken::new();
        let sweep_task = spawn_sweeper(
            store.clone(),
            config.sweep_interval_secs,
            shutdown_token.clone(),
        );
        let estimator = TokenEstimator::new();

        Self {
            config,
            store,
            pruner: HistoryPruner::with_estimator(estimator.clone()),
            estimator,
            handles: HandleGenerator::new(),
            shutdown_token,
            sweep_task: Mutex::new(Some(sweep_task)),
        }
    }

    /// Token estimator used for inline histories and new turns
    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    /// Resolve a history source into the effective prior turns
    ///
    /// Never errors: an unknown, expired or corrupt handle degrades to the
    /// client-supplied history, or to an empty conversation.
    pub async fn resolve(&self, source: HistorySource) -> Vec<Turn> {
        match source {
            HistorySource::Empty => Vec::new(),
            HistorySource::Inline(payload) => payload.into_turns(&self.estimator),
            HistorySource::Handle { handle, fallback } => {
                if let Some(stored) = self.store.get(&handle).await {
                    match decode_turns(&stored) {
                        Ok(turns) => return turns,
                        Err(error) => {
                            tracing::warn!(%handle, %error, "dropping corrupt session");
                            self.store.remove(&handle).await;
                        }
                    }
                } else {
                    tracing::debug!(%handle, "unknown or expired context handle");
                }
                fallback
                    .map(|payload| payload.into_turns(&self.estimator))
                    .unwrap_or_default()
            }
        }
    }

    /// Append a new exchange, prune to the token budget, and store the
    /// result under a fresh content-addressed handle
    pub async fn commit(
        &self,
        prior_turns: Vec<Turn>,
        new_turn: Turn,
        token_budget: usize,
    ) -> CacheResult<CommitOutcome> {
        let mut turns = prior_turns;
        turns.push(new_turn);

        let outcome = self.pruner.prune(turns, token_budget);

        let canonical = serde_json::to_vec(&outcome.kept)?;
        let raw_size = canonical.len();
        let handle = self.handles.generate(&canonical);
        let (payload, is_compressed) =
            maybe_compress(&canonical, self.config.compression_threshold)?;
        let stored_size = payload.len();

        let now = Utc::now();
        let session = StoredSession {
            payload,
            is_compressed,
            total_tokens: outcome.kept_tokens,
            created_at: now,
            last_accessed_at: now,
            raw_size,
            stored_size,
        };
        self.store.put(&handle, session).await;

        tracing::debug!(
            %handle,
            turns = outcome.kept.len(),
            total_tokens = outcome.kept_tokens,
            truncated = outcome.truncated,
            raw_size,
            stored_size,
            is_compressed,
            "committed conversation state"
        );

        Ok(CommitOutcome {
            handle,
            truncated: outcome.truncated,
            total_tokens: outcome.kept_tokens,
        })
    }

    /// Resolve a handle into the full session view, if present
    pub async fn session(&self, handle: &str) -> Option<Session> {
        let stored = self.store.get(handle).await?;
        let turns = match decode_turns(&stored) {
            Ok(turns) => turns,
            Err(error) => {
                tracing::warn!(%handle, %error, "dropping corrupt session");
                self.store.remove(handle).await;
                return None;
            }
        };
        Some(Session {
            handle: handle.to_string(),
            turns,
            total_tokens: stored.total_tokens,
            created_at: stored.created_at,
            last_accessed_at: stored.last_accessed_at,
            is_compressed: stored.is_compressed,
            raw_size: stored.raw_size,
            stored_size: stored.stored_size,
        })
    }

    /// Read-only cache snapshot for admin tooling
    pub fn stats(&self) -> CacheStats {
        let store_stats = self.store.statistics();
        CacheStats {
            cache_size: self.store.len(),
            cache_max: self.config.max_sessions,
            cache_ttl: self.config.ttl_secs,
            distributed_enabled: self.store.distributed_enabled(),
            compression_threshold: self.config.compression_threshold,
            hits: store_stats.hits,
            misses: store_stats.misses,
            evictions: store_stats.evictions,
            expirations: store_stats.expirations,
        }
    }

    /// Stop the background sweep task
    ///
    /// In-flight resolve/commit calls are unaffected.
    pub async fn shutdown(&self) {
        self.shutdown_token.cancel();
        let task = self.sweep_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

/// Decode a stored session back into its turn list
fn decode_turns(stored: &StoredSession) -> CacheResult<Vec<Turn>> {
    let canonical = decompress(&stored.payload, stored.is_compressed)?;
    Ok(serde_json::from_slice(&canonical)?)
}

fn spawn_sweeper(
    store: Arc<SessionStore>,
    interval_secs: u64,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = store.sweep();
                    if removed > 0 {
                        tracing::debug!(removed, "swept idle sessions");
                    }
                }
            }
        }
    })
}
