//! Convocache Core Library
//!
//! Server-side conversation context cache for chat-completion services.
//! Clients submit a short opaque handle instead of re-sending full
//! conversation history on every turn; the service resolves the handle to
//! prior turns, appends the new exchange, prunes the result to a token
//! budget, and issues a new handle for the updated state.

pub mod compress;
pub mod config;
pub mod error;
pub mod estimator;
pub mod handle;
pub mod pruner;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use estimator::TokenEstimator;
pub use handle::HandleGenerator;
pub use pruner::{HistoryPruner, PruneOutcome};
pub use service::ContextCacheService;
pub use store::{RedisBackend, RemoteBackend, SessionStore, ShardedStore, StoreStatistics};
pub use types::{
    CacheStats, CommitOutcome, HistoryPayload, HistorySource, Session, StoredSession, Turn,
};
