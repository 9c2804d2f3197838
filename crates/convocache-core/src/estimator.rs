//! Token estimation for conversation turns
//!
//! Exact tokenization varies by model, so costs are approximated from
//! character counts with a fixed per-turn overhead.

use crate::types::Turn;

/// Ceiling charged to a turn whose cost cannot be scored; over-pruning is
/// preferred to overflowing the token budget
pub const MAX_TURN_COST: usize = 4096;

/// Token estimator for conversation turns
#[derive(Debug, Clone)]
pub struct TokenEstimator {
    /// Characters per token (average)
    chars_per_token: f32,
    /// Overhead tokens per turn (role markers, formatting)
    turn_overhead: usize,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenEstimator {
    /// Create an estimator with default settings
    pub fn new() -> Self {
        Self {
            chars_per_token: 4.0, // Common approximation for English text
            turn_overhead: 8,     // Two role markers plus formatting
        }
    }

    /// Create an estimator with a custom characters-per-token ratio
    pub fn with_chars_per_token(chars_per_token: f32) -> Self {
        Self {
            chars_per_token,
            turn_overhead: 8,
        }
    }

    /// Estimate tokens for a string
    pub fn estimate_text(&self, text: &str) -> usize {
        (text.len() as f32 / self.chars_per_token).ceil() as usize
    }

    /// Estimate tokens for one user/bot exchange
    pub fn estimate_turn(&self, user_text: &str, bot_text: &str) -> usize {
        self.estimate_text(user_text) + self.estimate_text(bot_text) + self.turn_overhead
    }

    /// Token cost of a turn, trusting its recorded cost when present
    ///
    /// A non-empty turn with no usable recorded cost is re-estimated; if the
    /// estimator itself is unusable the turn is charged [`MAX_TURN_COST`].
    pub fn turn_cost(&self, turn: &Turn) -> usize {
        if turn.token_cost > 0 {
            return turn.token_cost;
        }
        if turn.user_text.is_empty() && turn.bot_text.is_empty() {
            return turn.token_cost;
        }
        if !self.chars_per_token.is_finite() || self.chars_per_token <= 0.0 {
            return MAX_TURN_COST;
        }
        self.estimate_turn(&turn.user_text, &turn.bot_text)
    }

    /// Total cost of a turn list
    pub fn history_cost(&self, turns: &[Turn]) -> usize {
        turns.iter().map(|t| self.turn_cost(t)).sum()
    }
}
