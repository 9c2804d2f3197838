//! Core types for conversation sessions

use crate::estimator::TokenEstimator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One user/bot exchange with its estimated token cost
///
/// Turns are immutable once created; conversation state is only ever
/// extended by appending new turns, never by editing old ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Text sent by the user
    pub user_text: String,
    /// Text produced by the model
    pub bot_text: String,
    /// Estimated token cost of the pair
    pub token_cost: usize,
}

impl Turn {
    /// Create a turn with an explicit token cost
    pub fn new(
        user_text: impl Into<String>,
        bot_text: impl Into<String>,
        token_cost: usize,
    ) -> Self {
        Self {
            user_text: user_text.into(),
            bot_text: bot_text.into(),
            token_cost,
        }
    }

    /// Create a turn, estimating its token cost
    pub fn estimated(
        user_text: impl Into<String>,
        bot_text: impl Into<String>,
        estimator: &TokenEstimator,
    ) -> Self {
        let user_text = user_text.into();
        let bot_text = bot_text.into();
        let token_cost = estimator.estimate_turn(&user_text, &bot_text);
        Self {
            user_text,
            bot_text,
            token_cost,
        }
    }
}

/// Conversation history in the wire shape used by chat clients
///
/// Parallel arrays of user and bot messages; entries are zipped pairwise
/// into [`Turn`]s, and an unpaired trailing user message is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPayload {
    /// User messages, oldest first
    #[serde(default)]
    pub user: Vec<String>,
    /// Bot messages, oldest first
    #[serde(default)]
    pub bot: Vec<String>,
}

impl HistoryPayload {
    /// Whether the payload carries no messages at all
    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.bot.is_empty()
    }

    /// Convert the parallel arrays into a turn list
    pub fn into_turns(self, estimator: &TokenEstimator) -> Vec<Turn> {
        self.user
            .into_iter()
            .zip(self.bot)
            .map(|(user_text, bot_text)| Turn::estimated(user_text, bot_text, estimator))
            .collect()
    }

    /// Build a payload from a turn list
    pub fn from_turns(turns: &[Turn]) -> Self {
        Self {
            user: turns.iter().map(|t| t.user_text.clone()).collect(),
            bot: turns.iter().map(|t| t.bot_text.clone()).collect(),
        }
    }
}

/// Where the prior conversation state for a request comes from
///
/// The optional `context_hash` / `history` request fields are resolved into
/// this variant once at the API boundary, so the cache logic never branches
/// on raw request shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistorySource {
    /// A context handle from a previous commit; the inline payload, if the
    /// client also sent one, is used when the handle misses
    Handle {
        handle: String,
        fallback: Option<HistoryPayload>,
    },
    /// Client-supplied history with no handle (legacy stateless path)
    Inline(HistoryPayload),
    /// New conversation
    Empty,
}

impl HistorySource {
    /// Resolve the optional request fields into a single source
    pub fn from_request(context_hash: Option<String>, history: Option<HistoryPayload>) -> Self {
        match (context_hash, history) {
            (Some(handle), fallback) if !handle.is_empty() => Self::Handle { handle, fallback },
            (_, Some(payload)) if !payload.is_empty() => Self::Inline(payload),
            _ => Self::Empty,
        }
    }
}

/// A stored conversation session, resolved into its full view
///
/// Sessions are immutable value objects: committing a new turn always
/// produces a new session under a new handle, never an in-place update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// 128-bit content-addressed identifier, hex-encoded
    pub handle: String,
    /// Ordered turns, oldest first
    pub turns: Vec<Turn>,
    /// Sum of turn token costs after the last prune
    pub total_tokens: usize,
    /// When the session was committed
    pub created_at: DateTime<Utc>,
    /// When the session was last read
    pub last_accessed_at: DateTime<Utc>,
    /// Whether the stored payload is compressed
    pub is_compressed: bool,
    /// Serialized size before compression
    pub raw_size: usize,
    /// Size as stored
    pub stored_size: usize,
}

/// The stored form of a session: serialized (possibly compressed) turn
/// payload plus metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    /// Serialized turns, compressed when `is_compressed` is set
    pub payload: Vec<u8>,
    /// Whether `payload` is gzip-compressed
    pub is_compressed: bool,
    /// Sum of turn token costs at commit time
    pub total_tokens: usize,
    /// When the session was committed
    pub created_at: DateTime<Utc>,
    /// When the session was last read (drives TTL)
    pub last_accessed_at: DateTime<Utc>,
    /// Serialized size before compression
    pub raw_size: usize,
    /// Size as stored
    pub stored_size: usize,
}

impl StoredSession {
    /// Refresh the access timestamp
    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }

    /// Seconds since the session was last read
    pub fn idle_secs(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.last_accessed_at)
            .num_seconds()
    }
}

/// Result of committing a new exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Handle for the newly stored state
    pub handle: String,
    /// Whether pruning dropped part of the logical conversation
    pub truncated: bool,
    /// Token cost of the stored history
    pub total_tokens: usize,
}

/// Read-only cache snapshot for admin tooling
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Sessions currently held in the local store
    pub cache_size: usize,
    /// Configured capacity
    pub cache_max: usize,
    /// Configured idle TTL in seconds
    pub cache_ttl: u64,
    /// Whether a remote backend is attached
    pub distributed_enabled: bool,
    /// Configured compression threshold in bytes
    pub compression_threshold: usize,
    /// Local store hits
    pub hits: u64,
    /// Local store misses
    pub misses: u64,
    /// Sessions evicted under capacity pressure
    pub evictions: u64,
    /// Sessions dropped by TTL expiry
    pub expirations: u64,
}
