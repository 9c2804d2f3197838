//! Token-budget pruning of conversation history
//!
//! Keeps the maximal suffix of a turn list that fits the budget: recency
//! always wins over completeness. Turn order is never altered; pruning only
//! drops a contiguous oldest-first prefix.

use crate::estimator::TokenEstimator;
use crate::types::Turn;

/// History pruner bound to a token estimator
#[derive(Debug, Clone, Default)]
pub struct HistoryPruner {
    estimator: TokenEstimator,
}

impl HistoryPruner {
    /// Create a pruner with the default estimator
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pruner with a custom estimator
    pub fn with_estimator(estimator: TokenEstimator) -> Self {
        Self { estimator }
    }

    /// Prune `turns` to fit within `budget` tokens
    ///
    /// If even the single most recent turn exceeds the budget on its own,
    /// exactly that turn is kept, so a non-empty conversation never prunes
    /// to empty.
    pub fn prune(&self, turns: Vec<Turn>, budget: usize) -> PruneOutcome {
        if turns.is_empty() {
            return PruneOutcome {
                kept: turns,
                truncated: false,
                kept_tokens: 0,
            };
        }

        // Walk backwards from the most recent turn, accumulating cost
        let mut kept_tokens = 0usize;
        let mut start = turns.len();
        while start > 0 {
            let cost = self.estimator.turn_cost(&turns[start - 1]);
            if kept_tokens.saturating_add(cost) > budget {
                break;
            }
            kept_tokens += cost;
            start -= 1;
        }

        if start == turns.len() {
            // The newest turn alone blows the budget; keep it anyway
            start = turns.len() - 1;
            kept_tokens = self.estimator.turn_cost(&turns[start]);
        }

        let truncated = start > 0;
        let kept = if truncated {
            turns[start..].to_vec()
        } else {
            turns
        };

        PruneOutcome {
            kept,
            truncated,
            kept_tokens,
        }
    }
}

/// Result of a pruning operation
#[derive(Debug, Clone)]
pub struct PruneOutcome {
    /// Turns that were kept, oldest first
    pub kept: Vec<Turn>,
    /// Whether any prefix of the conversation was dropped
    pub truncated: bool,
    /// Token cost of the kept turns
    pub kept_tokens: usize,
}
