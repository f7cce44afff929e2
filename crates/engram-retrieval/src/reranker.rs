// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optional LLM rerank stage.
//!
//! Batches the top candidates into one chat-completion call asking for a
//! relevance ordering. Any failure (transport, malformed response, indices
//! out of range) is returned as an error; the orchestrator logs it and keeps
//! the scorer's order. Rerank failure is never fatal to retrieval.

use std::sync::Arc;

use engram_core::types::{ChatMessage, CompletionRequest};
use engram_core::{CompletionProvider, EngramError};
use engram_resilience::CircuitBreaker;
use tracing::debug;

use crate::types::Candidate;

const RERANK_SYSTEM_PROMPT: &str = "You rank memory snippets by relevance to a query. \
Reply with ONLY a JSON array of zero-based snippet indices, most relevant first, \
covering every snippet exactly once. Example: [2, 0, 1]";

pub struct Reranker {
    completer: Arc<dyn CompletionProvider>,
    breaker: Arc<CircuitBreaker>,
    max_candidates: usize,
}

impl Reranker {
    /// The breaker is shared with the fusion stage: both talk to the same
    /// remote text-generation dependency, so an open circuit blocks both.
    pub fn new(
        completer: Arc<dyn CompletionProvider>,
        breaker: Arc<CircuitBreaker>,
        max_candidates: usize,
    ) -> Self {
        Self {
            completer,
            breaker,
            max_candidates,
        }
    }

    /// Reorder candidates by one remote relevance call.
    ///
    /// Only the first `max_candidates` entries are submitted; anything past
    /// that keeps its scorer position after the reranked head.
    pub async fn rerank(
        &self,
        candidates: Vec<Candidate>,
        query: &str,
    ) -> Result<Vec<Candidate>, (Vec<Candidate>, EngramError)> {
        if candidates.len() < 2 {
            return Ok(candidates);
        }

        let head_len = candidates.len().min(self.max_candidates);
        let prompt = build_prompt(&candidates[..head_len], query);
        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system(RERANK_SYSTEM_PROMPT),
                ChatMessage::user(prompt),
            ],
            max_tokens: 256,
            temperature: 0.0,
        };

        let response = match self
            .breaker
            .call(|| self.completer.complete(request))
            .await
        {
            Ok(r) => r,
            Err(e) => return Err((candidates, e)),
        };

        let order = match parse_index_order(&response.content, head_len) {
            Ok(order) => order,
            Err(e) => return Err((candidates, e)),
        };

        debug!(reranked = head_len, "applied remote rerank order");
        Ok(apply_order(candidates, &order, head_len))
    }
}

fn build_prompt(candidates: &[Candidate], query: &str) -> String {
    let mut prompt = format!("Query: {query}\n\nSnippets:\n");
    for (i, candidate) in candidates.iter().enumerate() {
        prompt.push_str(&format!("[{i}] {}\n", candidate.turn.content));
    }
    prompt
}

/// Parse a JSON index array out of the model's reply.
///
/// Tolerates surrounding prose by extracting the first bracketed span, but
/// rejects duplicates, out-of-range indices, and incomplete orderings.
fn parse_index_order(content: &str, expected_len: usize) -> Result<Vec<usize>, EngramError> {
    let start = content.find('[');
    let end = content.rfind(']');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(EngramError::permanent(format!(
            "rerank response contained no JSON array: {content:?}"
        )));
    };
    if end <= start {
        return Err(EngramError::permanent(
            "rerank response contained malformed brackets".to_string(),
        ));
    }

    let order: Vec<usize> =
        serde_json::from_str(&content[start..=end]).map_err(|e| EngramError::Permanent {
            message: format!("rerank response was not an index array: {e}"),
            source: Some(Box::new(e)),
        })?;

    if order.len() != expected_len {
        return Err(EngramError::permanent(format!(
            "rerank order has {} entries, expected {expected_len}",
            order.len()
        )));
    }
    let mut seen = vec![false; expected_len];
    for &idx in &order {
        if idx >= expected_len || seen[idx] {
            return Err(EngramError::permanent(format!(
                "rerank order is not a permutation: index {idx}"
            )));
        }
        seen[idx] = true;
    }
    Ok(order)
}

fn apply_order(candidates: Vec<Candidate>, order: &[usize], head_len: usize) -> Vec<Candidate> {
    let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(slots.len());
    for &idx in order {
        if let Some(candidate) = slots[idx].take() {
            out.push(candidate);
        }
    }
    // Tail past the rerank window keeps its scorer order.
    for slot in slots.into_iter().skip(head_len) {
        if let Some(candidate) = slot {
            out.push(candidate);
        }
    }
    out
}
