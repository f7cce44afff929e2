// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ephemeral retrieval types, built fresh per `get_context` call and never
//! persisted.

use engram_core::types::{Turn, TurnId};
use serde::Serialize;
use strum::Display;

/// Per-dimension sub-scores, each normalized to [0, 1].
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ScoreBreakdown {
    /// Clamped cosine similarity between query and turn embeddings.
    pub semantic: f32,
    /// Exponential recency decay.
    pub temporal: f32,
    /// Session affinity: 1.0 inside the active session.
    pub context: f32,
    /// Fraction of query terms literally present in the turn text.
    pub keyword: f32,
}

/// A retrieved turn annotated with its scores.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub turn: Turn,
    /// Raw similarity as returned by vector search.
    pub similarity: f32,
    pub breakdown: ScoreBreakdown,
    /// Weighted sum of the breakdown under the selected profile.
    pub final_score: f32,
}

impl Candidate {
    pub fn new(turn: Turn, similarity: f32) -> Self {
        Self {
            turn,
            similarity,
            breakdown: ScoreBreakdown::default(),
            final_score: 0.0,
        }
    }
}

/// Which tier of the fusion cascade produced the briefing.
///
/// Callers can always distinguish a degraded answer from a real one; the
/// engine never disguises a fallback as remote output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    /// Remote fusion call succeeded and passed the quality check.
    Remote,
    /// Local extractive summary built from candidate text verbatim.
    Extractive,
    /// No candidates were available; the briefing is the original query.
    NoMemory,
}

/// The result of a `get_context` call.
#[derive(Debug, Clone)]
pub struct ContextResult {
    /// The memory briefing handed to the caller.
    pub briefing: String,
    /// Ids of the turns that contributed to the briefing.
    pub used_turn_ids: Vec<TurnId>,
    /// The cascade tier that actually produced the briefing.
    pub strategy: FusionStrategy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_display() {
        assert_eq!(FusionStrategy::Remote.to_string(), "remote");
        assert_eq!(FusionStrategy::Extractive.to_string(), "extractive");
        assert_eq!(FusionStrategy::NoMemory.to_string(), "no_memory");
    }

    #[test]
    fn strategy_serializes_snake_case() {
        let json = serde_json::to_string(&FusionStrategy::NoMemory).unwrap();
        assert_eq!(json, "\"no_memory\"");
    }
}
