// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Engram memory engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup. Every tunable has a documented default; nothing
//! the engine consumes is hard-coded at call sites.

use serde::{Deserialize, Serialize};

/// Top-level Engram configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngramConfig {
    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Fusion/compression provider settings.
    #[serde(default)]
    pub fusion: FusionConfig,

    /// Retrieval pipeline settings (scoring weights, thresholds, rerank).
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Circuit breaker and retry settings.
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding API (the `/embeddings` path is appended).
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// Bearer token for authentication.
    #[serde(default)]
    pub api_key: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Deployment-fixed embedding dimension. Vectors of any other length
    /// are rejected as a permanent provider error.
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Input is truncated to this many characters before send.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            api_key: String::new(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            max_input_chars: default_max_input_chars(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

/// Fusion/compression provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FusionConfig {
    /// Base URL of the chat-completions API.
    #[serde(default = "default_fusion_base_url")]
    pub base_url: String,

    /// Bearer token for authentication.
    #[serde(default)]
    pub api_key: String,

    /// Model identifier for the fusion call.
    #[serde(default = "default_fusion_model")]
    pub model: String,

    /// Token budget for the generated briefing.
    #[serde(default = "default_fusion_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature for the fusion call.
    #[serde(default = "default_fusion_temperature")]
    pub temperature: f64,

    /// Number of top candidates included in the fusion prompt.
    #[serde(default = "default_fusion_candidates")]
    pub fusion_candidates: usize,

    /// A remote briefing shorter than this (after trimming) fails the
    /// quality check and triggers the extractive fallback.
    #[serde(default = "default_min_briefing_chars")]
    pub min_briefing_chars: usize,

    /// Character budget for the extractive fallback summary.
    #[serde(default = "default_extractive_budget_chars")]
    pub extractive_budget_chars: usize,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            base_url: default_fusion_base_url(),
            api_key: String::new(),
            model: default_fusion_model(),
            max_tokens: default_fusion_max_tokens(),
            temperature: default_fusion_temperature(),
            fusion_candidates: default_fusion_candidates(),
            min_briefing_chars: default_min_briefing_chars(),
            extractive_budget_chars: default_extractive_budget_chars(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

/// Retrieval pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Default maximum number of candidates returned by vector search.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Minimum clamped cosine similarity for a turn to become a candidate.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Half-life in hours for the exponential temporal decay sub-score.
    #[serde(default = "default_temporal_half_life_hours")]
    pub temporal_half_life_hours: f64,

    /// Context sub-score for candidates outside the active session.
    /// Candidates sharing the active session always score 1.0.
    #[serde(default = "default_other_session_affinity")]
    pub other_session_affinity: f32,

    /// Enable the optional neural rerank stage.
    #[serde(default = "default_rerank_enabled")]
    pub rerank_enabled: bool,

    /// At most this many top candidates are batched into one rerank call.
    #[serde(default = "default_rerank_max_candidates")]
    pub rerank_max_candidates: usize,

    /// Duplicate `(session, content_hash)` writes within this window are
    /// silently deduplicated.
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,

    /// Per-query-profile scoring weight tables.
    #[serde(default)]
    pub weights: WeightTables,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            similarity_threshold: default_similarity_threshold(),
            temporal_half_life_hours: default_temporal_half_life_hours(),
            other_session_affinity: default_other_session_affinity(),
            rerank_enabled: default_rerank_enabled(),
            rerank_max_candidates: default_rerank_max_candidates(),
            dedup_window_secs: default_dedup_window_secs(),
            weights: WeightTables::default(),
        }
    }
}

/// Scoring weights for one query profile. Must sum to 1.0.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Weights {
    pub semantic: f32,
    pub temporal: f32,
    pub context: f32,
    pub keyword: f32,
}

impl Weights {
    /// Sum of all four weights.
    pub fn sum(&self) -> f32 {
        self.semantic + self.temporal + self.context + self.keyword
    }
}

/// Immutable per-profile weight tables, loaded once at startup.
///
/// Defaults: technical queries lean on semantic similarity; conversational
/// queries lean on recency and session affinity; diagnostic queries sit in
/// between. These are empirically tunable constants, not fixed requirements.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WeightTables {
    #[serde(default = "default_technical_weights")]
    pub technical: Weights,
    #[serde(default = "default_conversational_weights")]
    pub conversational: Weights,
    #[serde(default = "default_diagnostic_weights")]
    pub diagnostic: Weights,
}

impl Default for WeightTables {
    fn default() -> Self {
        Self {
            technical: default_technical_weights(),
            conversational: default_conversational_weights(),
            diagnostic: default_diagnostic_weights(),
        }
    }
}

/// Circuit breaker and retry configuration, shared by all guarded
/// dependencies (embedding, fusion, database).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResilienceConfig {
    /// Consecutive failures before a breaker opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Consecutive half-open trial successes needed to close.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    /// Seconds an open breaker waits before allowing trial calls.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Maximum retry attempts for transient failures (the first call plus
    /// `max_retries` re-attempts).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff, in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Backoff delay ceiling, in milliseconds.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Overall deadline for one engine operation, in seconds. Expiry aborts
    /// in-flight remote calls and surfaces `DeadlineExceeded`.
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            cooldown_secs: default_cooldown_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            operation_timeout_secs: default_operation_timeout_secs(),
        }
    }
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Weight tables must sum to 1.0 within this tolerance.
const WEIGHT_SUM_TOLERANCE: f32 = 1e-3;

/// Validate a loaded configuration.
///
/// Checks the invariants serde cannot express: each weight table sums to
/// 1.0, the embedding dimension is non-zero, and thresholds are in range.
pub fn validate(config: &EngramConfig) -> Result<(), engram_core::EngramError> {
    use engram_core::EngramError;

    for (name, table) in [
        ("technical", &config.retrieval.weights.technical),
        ("conversational", &config.retrieval.weights.conversational),
        ("diagnostic", &config.retrieval.weights.diagnostic),
    ] {
        let sum = table.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngramError::Config(format!(
                "weights for profile '{name}' must sum to 1.0, got {sum}"
            )));
        }
        for (dim, w) in [
            ("semantic", table.semantic),
            ("temporal", table.temporal),
            ("context", table.context),
            ("keyword", table.keyword),
        ] {
            if !(0.0..=1.0).contains(&w) {
                return Err(EngramError::Config(format!(
                    "weight '{dim}' for profile '{name}' must be in [0, 1], got {w}"
                )));
            }
        }
    }

    if config.embedding.dimension == 0 {
        return Err(EngramError::Config(
            "embedding.dimension must be non-zero".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&config.retrieval.similarity_threshold) {
        return Err(EngramError::Config(format!(
            "retrieval.similarity_threshold must be in [0, 1], got {}",
            config.retrieval.similarity_threshold
        )));
    }
    if config.retrieval.temporal_half_life_hours <= 0.0 {
        return Err(EngramError::Config(
            "retrieval.temporal_half_life_hours must be positive".to_string(),
        ));
    }
    Ok(())
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}

fn default_embedding_dimension() -> usize {
    4096
}

fn default_max_input_chars() -> usize {
    8000
}

fn default_provider_timeout_secs() -> u64 {
    30
}

fn default_fusion_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_fusion_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_fusion_max_tokens() -> u32 {
    512
}

fn default_fusion_temperature() -> f64 {
    0.3
}

fn default_fusion_candidates() -> usize {
    10
}

fn default_min_briefing_chars() -> usize {
    24
}

fn default_extractive_budget_chars() -> usize {
    2000
}

fn default_max_results() -> usize {
    10
}

fn default_similarity_threshold() -> f32 {
    0.25
}

fn default_temporal_half_life_hours() -> f64 {
    24.0
}

fn default_other_session_affinity() -> f32 {
    0.3
}

fn default_rerank_enabled() -> bool {
    false
}

fn default_rerank_max_candidates() -> usize {
    20
}

fn default_dedup_window_secs() -> u64 {
    60
}

fn default_technical_weights() -> Weights {
    Weights {
        semantic: 0.55,
        temporal: 0.15,
        context: 0.15,
        keyword: 0.15,
    }
}

fn default_conversational_weights() -> Weights {
    Weights {
        semantic: 0.25,
        temporal: 0.35,
        context: 0.30,
        keyword: 0.10,
    }
}

fn default_diagnostic_weights() -> Weights {
    Weights {
        semantic: 0.40,
        temporal: 0.30,
        context: 0.15,
        keyword: 0.15,
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_cooldown_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

fn default_retry_max_delay_ms() -> u64 {
    5000
}

fn default_operation_timeout_secs() -> u64 {
    60
}

fn default_database_path() -> String {
    "engram.db".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = EngramConfig::default();
        validate(&config).expect("defaults must pass validation");
    }

    #[test]
    fn default_weight_tables_sum_to_one() {
        let tables = WeightTables::default();
        for table in [tables.technical, tables.conversational, tables.diagnostic] {
            assert!((table.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        }
    }

    #[test]
    fn bad_weight_sum_rejected() {
        let mut config = EngramConfig::default();
        config.retrieval.weights.technical.semantic = 0.9;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("technical"), "got: {err}");
    }

    #[test]
    fn zero_dimension_rejected() {
        let mut config = EngramConfig::default();
        config.embedding.dimension = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let mut config = EngramConfig::default();
        config.retrieval.similarity_threshold = 1.5;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn non_positive_half_life_rejected() {
        let mut config = EngramConfig::default();
        config.retrieval.temporal_half_life_hours = 0.0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn technical_profile_weights_semantic_highest() {
        let w = default_technical_weights();
        assert!(w.semantic > w.temporal);
        assert!(w.semantic > w.context);
        assert!(w.semantic > w.keyword);
    }

    #[test]
    fn conversational_profile_weights_recency_and_context() {
        let w = default_conversational_weights();
        assert!(w.temporal > w.semantic);
        assert!(w.temporal + w.context > w.semantic + w.keyword);
    }
}
