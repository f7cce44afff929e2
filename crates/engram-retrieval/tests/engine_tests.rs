// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end pipeline tests with deterministic stub providers.
//!
//! The stub embedder hashes bag-of-words into a fixed-dimension vector, so
//! texts sharing words get high cosine similarity without a live endpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use engram_config::EngramConfig;
use engram_core::types::{CompletionRequest, CompletionResponse, Role};
use engram_core::{CompletionProvider, EmbeddingProvider, EngramError};
use engram_resilience::CircuitState;
use engram_retrieval::{FusionStrategy, MemoryEngine};
use engram_storage::Database;

const DIM: usize = 64;

fn fnv1a(term: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in term.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Deterministic bag-of-words embedding: shared words mean shared
/// components, so related texts score high cosine similarity.
fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0_f32; DIM];
    let lowered = text.to_lowercase();
    for term in lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        vector[(fnv1a(term) % DIM as u64) as usize] += 1.0;
    }
    vector
}

struct StubEmbedder {
    calls: AtomicU64,
    fail: bool,
}

impl StubEmbedder {
    fn working() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU64::new(0),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU64::new(0),
            fail: true,
        })
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EngramError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EngramError::transient("embedding provider down"));
        }
        Ok(bag_of_words(text))
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

struct StubCompleter {
    calls: AtomicU64,
    reply: Option<String>,
}

impl StubCompleter {
    fn fixed(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU64::new(0),
            reply: Some(reply.to_string()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU64::new(0),
            reply: None,
        })
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for StubCompleter {
    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<CompletionResponse, EngramError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Some(content) => Ok(CompletionResponse {
                content: content.clone(),
            }),
            None => Err(EngramError::transient("fusion provider down")),
        }
    }
}

/// Fast-failing resilience settings so breaker tests finish quickly.
fn test_config() -> EngramConfig {
    let mut config = EngramConfig::default();
    config.resilience.max_retries = 0;
    config.resilience.retry_base_delay_ms = 1;
    config.resilience.retry_max_delay_ms = 2;
    config.resilience.failure_threshold = 3;
    config.resilience.cooldown_secs = 60;
    config
}

async fn engine_with(
    config: EngramConfig,
    embedder: Arc<StubEmbedder>,
    completer: Arc<StubCompleter>,
) -> MemoryEngine {
    let db = Database::open_in_memory().await.unwrap();
    MemoryEngine::new(&config, db, embedder, completer).unwrap()
}

#[tokio::test]
async fn stored_fact_surfaces_in_briefing() {
    // Scenario: one stored turn holds the cat's name; the later query gets
    // a briefing containing it even when remote fusion is down.
    let engine = engine_with(test_config(), StubEmbedder::working(), StubCompleter::failing()).await;

    engine
        .save_turn("S1", Role::User, "the cat's name is Mochi", None)
        .await
        .unwrap();

    let result = engine
        .get_context("what is my cat's name?", Some("S1"), Some(5))
        .await
        .unwrap();

    assert!(result.briefing.contains("Mochi"), "briefing: {}", result.briefing);
    assert_ne!(result.strategy, FusionStrategy::NoMemory);
    assert_eq!(result.used_turn_ids.len(), 1);
}

#[tokio::test]
async fn empty_turn_text_fails_before_embedding() {
    let embedder = StubEmbedder::working();
    let engine = engine_with(test_config(), embedder.clone(), StubCompleter::failing()).await;

    let err = engine.save_turn("S1", Role::User, "", None).await.unwrap_err();
    assert!(matches!(err, EngramError::InvalidInput(_)));
    assert!(matches!(
        engine.save_turn("S1", Role::User, "   \n", None).await.unwrap_err(),
        EngramError::InvalidInput(_)
    ));
    assert_eq!(embedder.calls(), 0, "no embedding call for invalid input");
}

#[tokio::test]
async fn empty_query_fails_before_embedding() {
    let embedder = StubEmbedder::working();
    let engine = engine_with(test_config(), embedder.clone(), StubCompleter::failing()).await;

    let err = engine.get_context("", Some("S1"), None).await.unwrap_err();
    assert!(matches!(err, EngramError::InvalidInput(_)));
    assert_eq!(embedder.calls(), 0);
}

#[tokio::test]
async fn concurrent_saves_keep_both_turns_and_latest_activity() {
    let engine = Arc::new(
        engine_with(test_config(), StubEmbedder::working(), StubCompleter::failing()).await,
    );

    let a = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .save_turn("S-CONC", Role::User, "first concurrent turn", None)
                .await
        })
    };
    let b = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .save_turn("S-CONC", Role::Assistant, "second concurrent turn", None)
                .await
        })
    };
    let (a, b) = tokio::join!(a, b);
    a.unwrap().unwrap();
    b.unwrap().unwrap();

    let turns = engine.get_turns("S-CONC", None).await.unwrap();
    assert_eq!(turns.len(), 2);

    let latest = turns.iter().map(|t| t.created_at.clone()).max().unwrap();
    let session = engine.get_session("S-CONC").await.unwrap().unwrap();
    assert_eq!(session.last_active, latest);
}

#[tokio::test]
async fn retrieval_recall_sanity() {
    let engine = engine_with(test_config(), StubEmbedder::working(), StubCompleter::failing()).await;

    let target = engine
        .save_turn("S1", Role::User, "we decided to deploy on fridays", None)
        .await
        .unwrap();
    engine
        .save_turn("S1", Role::User, "completely unrelated lunch plans", None)
        .await
        .unwrap();

    let result = engine
        .get_context("we decided to deploy on fridays", Some("S1"), None)
        .await
        .unwrap();

    assert_eq!(result.used_turn_ids[0], target, "exact match must rank first");
    assert!(result.briefing.starts_with("we decided to deploy on fridays"));
}

#[tokio::test]
async fn duplicate_save_within_window_returns_existing_id() {
    let engine = engine_with(test_config(), StubEmbedder::working(), StubCompleter::failing()).await;

    let first = engine
        .save_turn("S1", Role::User, "the cat's name is Mochi", None)
        .await
        .unwrap();
    let second = engine
        .save_turn("S1", Role::User, "The cat's  name is MOCHI", None)
        .await
        .unwrap();

    assert_eq!(first, second, "normalized duplicate must not re-insert");
    assert_eq!(engine.get_turns("S1", None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn breaker_opens_after_threshold_and_blocks_network() {
    let embedder = StubEmbedder::failing();
    let engine = engine_with(test_config(), embedder.clone(), StubCompleter::failing()).await;

    for _ in 0..3 {
        let err = engine.get_context("anything", None, None).await.unwrap_err();
        assert!(err.is_transient());
    }
    assert_eq!(embedder.calls(), 3);
    assert_eq!(engine.metrics().embedding.state, CircuitState::Open);

    // While open, calls fail fast with zero network attempts.
    let err = engine.get_context("anything", None, None).await.unwrap_err();
    assert!(matches!(err, EngramError::CircuitOpen { .. }));
    assert_eq!(embedder.calls(), 3, "open breaker must not reach the provider");
}

#[tokio::test]
async fn manual_reset_reopens_the_path() {
    let embedder = StubEmbedder::failing();
    let engine = engine_with(test_config(), embedder.clone(), StubCompleter::failing()).await;

    for _ in 0..3 {
        let _ = engine.get_context("anything", None, None).await;
    }
    assert_eq!(engine.metrics().embedding.state, CircuitState::Open);

    engine.reset_breakers();
    assert_eq!(engine.metrics().embedding.state, CircuitState::Closed);

    // The path is live again: the provider is reached (and still fails).
    let _ = engine.get_context("anything", None, None).await;
    assert_eq!(embedder.calls(), 4);
}

#[tokio::test]
async fn open_fusion_breaker_blocks_rerank_calls() {
    // Rerank and fusion share the text-generation breaker: once it opens,
    // neither stage may reach the completer.
    let mut config = test_config();
    config.retrieval.rerank_enabled = true;
    let completer = StubCompleter::failing();
    let engine = engine_with(config, StubEmbedder::working(), completer.clone()).await;

    engine
        .save_turn("S1", Role::User, "alpha beta gamma", None)
        .await
        .unwrap();
    engine
        .save_turn("S1", Role::User, "alpha beta delta", None)
        .await
        .unwrap();

    // First pass: rerank fails (1), remote fusion fails (2).
    engine.get_context("alpha beta", Some("S1"), None).await.unwrap();
    // Second pass: the rerank failure (3) trips the breaker open.
    engine.get_context("alpha beta", Some("S1"), None).await.unwrap();
    assert_eq!(engine.metrics().fusion.state, CircuitState::Open);

    let calls_when_open = completer.calls();
    let result = engine
        .get_context("alpha beta", Some("S1"), None)
        .await
        .unwrap();

    assert_eq!(
        completer.calls(),
        calls_when_open,
        "open breaker must block rerank and fusion alike"
    );
    assert_eq!(result.strategy, FusionStrategy::Extractive);
}

#[tokio::test]
async fn fusion_cascade_reports_extractive_tier() {
    let engine = engine_with(test_config(), StubEmbedder::working(), StubCompleter::failing()).await;

    engine
        .save_turn("S1", Role::User, "the staging database password rotates monthly", None)
        .await
        .unwrap();

    let result = engine
        .get_context("when does the staging database password rotate?", Some("S1"), None)
        .await
        .unwrap();

    assert_eq!(result.strategy, FusionStrategy::Extractive);
    assert!(!result.briefing.trim().is_empty());
    assert!(result.briefing.contains("rotates monthly"));
}

#[tokio::test]
async fn remote_fusion_used_when_available() {
    let completer = StubCompleter::fixed("The user's cat is named Mochi; remember that detail.");
    let engine = engine_with(test_config(), StubEmbedder::working(), completer).await;

    engine
        .save_turn("S1", Role::User, "the cat's name is Mochi", None)
        .await
        .unwrap();

    let result = engine
        .get_context("what is my cat's name?", Some("S1"), None)
        .await
        .unwrap();
    assert_eq!(result.strategy, FusionStrategy::Remote);
    assert!(result.briefing.contains("Mochi"));
}

#[tokio::test]
async fn empty_store_returns_bare_query_tagged_no_memory() {
    let engine = engine_with(test_config(), StubEmbedder::working(), StubCompleter::failing()).await;

    let result = engine
        .get_context("what is my cat's name?", None, None)
        .await
        .unwrap();
    assert_eq!(result.strategy, FusionStrategy::NoMemory);
    assert_eq!(result.briefing, "what is my cat's name?");
    assert!(result.used_turn_ids.is_empty());
}

#[tokio::test]
async fn session_lifecycle_list_and_purge() {
    let engine = engine_with(test_config(), StubEmbedder::working(), StubCompleter::failing()).await;

    engine.save_turn("S1", Role::User, "hello there", None).await.unwrap();
    // Millisecond timestamps: keep the two sessions' activity distinct.
    tokio::time::sleep(Duration::from_millis(5)).await;
    engine.save_turn("S2", Role::User, "general kenobi", None).await.unwrap();

    let sessions = engine.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 2);
    // Most recently active first.
    assert_eq!(sessions[0].id, "S2");

    let removed = engine.purge_session("S1").await.unwrap();
    assert_eq!(removed, 1);
    assert!(engine.get_session("S1").await.unwrap().is_none());
    assert_eq!(engine.list_sessions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn deadline_expiry_surfaces_deadline_exceeded() {
    struct SlowEmbedder;

    #[async_trait]
    impl EmbeddingProvider for SlowEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EngramError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![0.0; DIM])
        }

        fn dimension(&self) -> usize {
            DIM
        }
    }

    let mut config = test_config();
    config.resilience.operation_timeout_secs = 1;
    let db = Database::open_in_memory().await.unwrap();
    let engine =
        MemoryEngine::new(&config, db, Arc::new(SlowEmbedder), StubCompleter::failing()).unwrap();

    let err = engine
        .save_turn("S1", Role::User, "slow embedding", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngramError::DeadlineExceeded { .. }));
}
