// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-dimensional candidate scoring.
//!
//! Pure and deterministic: the caller supplies `now`, so the scorer performs
//! no I/O and no clock reads. Identical inputs always produce identical
//! ordering (stable sort, ties preserve input order).

use chrono::{DateTime, Utc};
use engram_config::{RetrievalConfig, WeightTables, Weights};
use tracing::debug;

use crate::profile::QueryProfile;
use crate::types::{Candidate, ScoreBreakdown};

/// Scoring parameters, fixed at engine construction.
#[derive(Debug, Clone)]
pub struct Scorer {
    half_life_hours: f64,
    other_session_affinity: f32,
    weights: WeightTables,
}

impl Scorer {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            half_life_hours: config.temporal_half_life_hours,
            other_session_affinity: config.other_session_affinity,
            weights: config.weights.clone(),
        }
    }

    /// Annotate each candidate with its four sub-scores and weighted
    /// `final_score`, then sort descending.
    pub fn score(
        &self,
        mut candidates: Vec<Candidate>,
        query: &str,
        active_session: Option<&str>,
        profile: QueryProfile,
        now: DateTime<Utc>,
    ) -> Vec<Candidate> {
        let weights = profile.weights(&self.weights);
        let query_terms = terms(query);

        for candidate in &mut candidates {
            let breakdown = ScoreBreakdown {
                semantic: candidate.similarity.clamp(0.0, 1.0),
                temporal: self.temporal_score(&candidate.turn.created_at, now),
                context: self.context_score(&candidate.turn.session_id, active_session),
                keyword: keyword_score(&query_terms, &candidate.turn.content),
            };
            candidate.final_score = weighted_sum(&breakdown, &weights);
            candidate.breakdown = breakdown;
        }

        // Stable sort keeps ties in input order for reproducibility.
        candidates.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            profile = %profile,
            candidates = candidates.len(),
            "scored candidates"
        );
        candidates
    }

    /// Exponential recency decay: 1.0 now, 0.5 after one half-life.
    fn temporal_score(&self, created_at: &str, now: DateTime<Utc>) -> f32 {
        let Ok(created) = DateTime::parse_from_rfc3339(created_at) else {
            return 0.0;
        };
        let age_ms = (now - created.with_timezone(&Utc)).num_milliseconds();
        if age_ms <= 0 {
            return 1.0;
        }
        let age_hours = age_ms as f64 / 3_600_000.0;
        0.5_f64.powf(age_hours / self.half_life_hours) as f32
    }

    fn context_score(&self, candidate_session: &str, active_session: Option<&str>) -> f32 {
        match active_session {
            Some(active) if active == candidate_session => 1.0,
            _ => self.other_session_affinity,
        }
    }
}

/// Fraction of distinct query terms literally present in the candidate text.
fn keyword_score(query_terms: &[String], content: &str) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let content_terms = terms(content);
    let hits = query_terms
        .iter()
        .filter(|t| content_terms.contains(t))
        .count();
    hits as f32 / query_terms.len() as f32
}

fn terms(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut out: Vec<String> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    out.sort();
    out.dedup();
    out
}

fn weighted_sum(breakdown: &ScoreBreakdown, weights: &Weights) -> f32 {
    breakdown.semantic * weights.semantic
        + breakdown.temporal * weights.temporal
        + breakdown.context * weights.context
        + breakdown.keyword * weights.keyword
}
