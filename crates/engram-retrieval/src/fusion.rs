// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Three-tier fusion cascade.
//!
//! 1. Remote chat-completion compresses the top candidates into a briefing,
//!    which must pass a quality check.
//! 2. On any failure: local extractive summary from candidate text verbatim.
//! 3. With no candidates at all: the original query, tagged [`FusionStrategy::NoMemory`].
//!
//! Every downgrade is logged with its reason. The tier that produced the
//! result is always reported; a degraded answer is never disguised.

use std::sync::Arc;

use engram_config::FusionConfig;
use engram_core::types::{ChatMessage, CompletionRequest};
use engram_core::{CompletionProvider, EngramError};
use engram_resilience::{CircuitBreaker, RetryPolicy};
use tracing::{debug, warn};

use crate::types::{Candidate, FusionStrategy};

const FUSION_SYSTEM_PROMPT: &str = "You compress retrieved conversation memories into a \
short briefing for an assistant. Keep concrete facts (names, values, decisions) verbatim. \
Answer with the briefing only, no preamble.";

/// Trimmed briefings matching one of these are treated as provider refusals
/// and fail the quality check.
const PLACEHOLDER_BRIEFINGS: &[&str] = &[
    "no relevant memories found.",
    "no relevant context found.",
    "i don't have any relevant memories.",
    "n/a",
];

pub struct FusionEngine {
    completer: Arc<dyn CompletionProvider>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    model_max_tokens: u32,
    temperature: f64,
    fusion_candidates: usize,
    min_briefing_chars: usize,
    extractive_budget_chars: usize,
}

impl FusionEngine {
    pub fn new(
        completer: Arc<dyn CompletionProvider>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
        config: &FusionConfig,
    ) -> Self {
        Self {
            completer,
            breaker,
            retry,
            model_max_tokens: config.max_tokens,
            temperature: config.temperature,
            fusion_candidates: config.fusion_candidates,
            min_briefing_chars: config.min_briefing_chars,
            extractive_budget_chars: config.extractive_budget_chars,
        }
    }

    /// How many top candidates one fusion call consumes.
    pub fn candidate_budget(&self) -> usize {
        self.fusion_candidates
    }

    /// Fuse ranked candidates into a briefing. Infallible by design: every
    /// failure degrades to the next tier instead of propagating.
    pub async fn fuse(&self, candidates: &[Candidate], query: &str) -> (String, FusionStrategy) {
        let top = &candidates[..candidates.len().min(self.fusion_candidates)];

        if top.is_empty() {
            warn!("no candidates available, returning bare query");
            return (query.to_string(), FusionStrategy::NoMemory);
        }

        match self.remote_fuse(top, query).await {
            Ok(briefing) => {
                debug!(chars = briefing.len(), "remote fusion succeeded");
                (briefing, FusionStrategy::Remote)
            }
            Err(e) => {
                warn!(error = %e, "remote fusion failed, falling back to extractive summary");
                match self.extractive(top) {
                    Some(summary) => (summary, FusionStrategy::Extractive),
                    None => {
                        warn!("extractive fallback produced no text, returning bare query");
                        (query.to_string(), FusionStrategy::NoMemory)
                    }
                }
            }
        }
    }

    /// Tier 1: remote compression, guarded by the fusion breaker and retry
    /// policy, then quality-checked.
    async fn remote_fuse(
        &self,
        candidates: &[Candidate],
        query: &str,
    ) -> Result<String, EngramError> {
        let prompt = build_fusion_prompt(candidates, query);
        let response = self
            .retry
            .run(|| {
                self.breaker.call(|| {
                    self.completer.complete(CompletionRequest {
                        messages: vec![
                            ChatMessage::system(FUSION_SYSTEM_PROMPT),
                            ChatMessage::user(prompt.clone()),
                        ],
                        max_tokens: self.model_max_tokens,
                        temperature: self.temperature,
                    })
                })
            })
            .await?;

        let briefing = response.content.trim();
        if briefing.chars().count() < self.min_briefing_chars {
            return Err(EngramError::permanent(format!(
                "briefing too short to be useful ({} chars)",
                briefing.chars().count()
            )));
        }
        if PLACEHOLDER_BRIEFINGS.contains(&briefing.to_lowercase().as_str()) {
            return Err(EngramError::permanent(
                "briefing matched a known placeholder".to_string(),
            ));
        }
        Ok(briefing.to_string())
    }

    /// Tier 2: candidate text verbatim, rank order, up to the char budget.
    fn extractive(&self, candidates: &[Candidate]) -> Option<String> {
        let mut summary = String::new();
        for candidate in candidates {
            let text = candidate.turn.content.trim();
            if text.is_empty() {
                continue;
            }
            let separator_len = if summary.is_empty() { 0 } else { 1 };
            let remaining = self
                .extractive_budget_chars
                .saturating_sub(summary.chars().count() + separator_len);
            if remaining == 0 {
                break;
            }
            if separator_len == 1 {
                summary.push('\n');
            }
            summary.extend(text.chars().take(remaining));
        }
        if summary.is_empty() { None } else { Some(summary) }
    }
}

fn build_fusion_prompt(candidates: &[Candidate], query: &str) -> String {
    let mut prompt = format!("Current query: {query}\n\nRetrieved memories:\n");
    for candidate in candidates {
        prompt.push_str(&format!(
            "- [{}] {}\n",
            candidate.turn.role.as_str(),
            candidate.turn.content
        ));
    }
    prompt.push_str("\nCompress these memories into a briefing relevant to the query.");
    prompt
}
