// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The memory engine: the two-operation boundary the host application sees.
//!
//! `save_turn` embeds and persists a dialogue turn; `get_context` runs the
//! retrieval pipeline (embed query, vector search, score, optional rerank,
//! fusion cascade). Every external dependency sits behind its own circuit
//! breaker, transient failures are retried with backoff, and each public
//! operation runs under the configured deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use engram_config::{EngramConfig, validate};
use engram_core::types::{Role, Session, Turn, TurnId, content_hash, now_iso};
use engram_core::{CompletionProvider, EmbeddingProvider, EngramError};
use engram_provider::{RemoteCompleter, RemoteEmbedder};
use engram_resilience::{BreakerMetrics, BreakerSettings, CircuitBreaker, RetryPolicy};
use engram_storage::queries::{sessions, turns};
use engram_storage::{Database, SaveOutcome};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::fusion::FusionEngine;
use crate::profile::QueryProfile;
use crate::reranker::Reranker;
use crate::scorer::Scorer;
use crate::types::{Candidate, ContextResult, FusionStrategy};

/// Breaker state snapshots for every guarded dependency.
#[derive(Debug, Clone)]
pub struct EngineMetrics {
    pub embedding: BreakerMetrics,
    pub fusion: BreakerMetrics,
    pub database: BreakerMetrics,
}

/// Long-term conversational memory engine.
///
/// Safe to share across concurrent callers: breaker state sits behind locks
/// and all storage goes through the single-writer connection.
pub struct MemoryEngine {
    db: Database,
    embedder: Arc<dyn EmbeddingProvider>,
    fusion: FusionEngine,
    reranker: Option<Reranker>,
    scorer: Scorer,
    embedding_breaker: Arc<CircuitBreaker>,
    fusion_breaker: Arc<CircuitBreaker>,
    database_breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    operation_timeout: Duration,
    max_results: usize,
    similarity_threshold: f32,
    dedup_window: Duration,
}

impl MemoryEngine {
    /// Assemble an engine from a validated config and explicit dependencies.
    ///
    /// The injectable providers keep the pipeline testable without a live
    /// endpoint; production callers use [`MemoryEngine::from_config`].
    pub fn new(
        config: &EngramConfig,
        db: Database,
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Arc<dyn CompletionProvider>,
    ) -> Result<Self, EngramError> {
        validate(config)?;

        let settings = BreakerSettings::from_config(&config.resilience);
        let retry = RetryPolicy::from_config(&config.resilience);
        let fusion_breaker = Arc::new(CircuitBreaker::new("fusion", settings.clone()));

        let fusion = FusionEngine::new(
            completer.clone(),
            fusion_breaker.clone(),
            retry.clone(),
            &config.fusion,
        );
        let reranker = config
            .retrieval
            .rerank_enabled
            .then(|| {
                Reranker::new(
                    completer,
                    fusion_breaker.clone(),
                    config.retrieval.rerank_max_candidates,
                )
            });

        Ok(Self {
            db,
            embedder,
            fusion,
            reranker,
            scorer: Scorer::from_config(&config.retrieval),
            embedding_breaker: Arc::new(CircuitBreaker::new("embedding", settings.clone())),
            fusion_breaker,
            database_breaker: Arc::new(CircuitBreaker::new("database", settings)),
            retry,
            operation_timeout: Duration::from_secs(config.resilience.operation_timeout_secs),
            max_results: config.retrieval.max_results,
            similarity_threshold: config.retrieval.similarity_threshold,
            dedup_window: Duration::from_secs(config.retrieval.dedup_window_secs),
        })
    }

    /// Open the configured database and remote providers, then assemble.
    pub async fn from_config(config: &EngramConfig) -> Result<Self, EngramError> {
        validate(config)?;
        let db = Database::open(&config.storage.database_path).await?;
        let embedder = Arc::new(RemoteEmbedder::new(&config.embedding)?);
        let completer = Arc::new(RemoteCompleter::new(&config.fusion)?);
        Self::new(config, db, embedder, completer)
    }

    /// Persist one dialogue turn: validate, embed, write atomically.
    ///
    /// Returns the id of the stored turn, or of the existing row when the
    /// write deduplicated against a recent identical turn.
    pub async fn save_turn(
        &self,
        session_id: &str,
        role: Role,
        text: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<TurnId, EngramError> {
        // Input validation happens before any provider call.
        if session_id.trim().is_empty() {
            return Err(EngramError::InvalidInput(
                "session_id must not be empty".to_string(),
            ));
        }
        if text.trim().is_empty() {
            return Err(EngramError::InvalidInput(
                "turn text must not be empty".to_string(),
            ));
        }

        self.with_deadline(self.save_turn_inner(session_id, role, text, metadata))
            .await
    }

    async fn save_turn_inner(
        &self,
        session_id: &str,
        role: Role,
        text: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<TurnId, EngramError> {
        let embedding = self.embed(text).await?;

        let turn = Turn {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            position: 0, // assigned inside the write transaction
            role,
            content: text.to_string(),
            embedding,
            content_hash: content_hash(text),
            metadata,
            created_at: now_iso(),
        };

        let outcome: SaveOutcome = self
            .database_breaker
            .call(|| turns::save_turn(&self.db, &turn, self.dedup_window))
            .await?;

        info!(
            session_id,
            turn_id = %outcome.turn_id.0,
            deduplicated = outcome.deduplicated,
            "turn saved"
        );
        Ok(outcome.turn_id)
    }

    /// Retrieve, score, and fuse relevant memories into a briefing.
    ///
    /// Never fails for a degraded-but-available memory system: rerank and
    /// fusion errors downgrade, and the returned strategy discloses the tier
    /// that produced the briefing.
    pub async fn get_context(
        &self,
        query: &str,
        session_id: Option<&str>,
        max_results: Option<usize>,
    ) -> Result<ContextResult, EngramError> {
        if query.trim().is_empty() {
            return Err(EngramError::InvalidInput(
                "query must not be empty".to_string(),
            ));
        }

        self.with_deadline(self.get_context_inner(query, session_id, max_results))
            .await
    }

    async fn get_context_inner(
        &self,
        query: &str,
        session_id: Option<&str>,
        max_results: Option<usize>,
    ) -> Result<ContextResult, EngramError> {
        let limit = max_results.unwrap_or(self.max_results);
        let query_vector = self.embed(query).await?;

        let hits = self
            .database_breaker
            .call(|| {
                turns::search(
                    &self.db,
                    &query_vector,
                    session_id,
                    limit,
                    self.similarity_threshold,
                )
            })
            .await?;

        let candidates: Vec<Candidate> = hits
            .into_iter()
            .map(|(turn, similarity)| Candidate::new(turn, similarity))
            .collect();

        let profile = QueryProfile::detect(query);
        let mut ranked = self
            .scorer
            .score(candidates, query, session_id, profile, Utc::now());

        if let Some(reranker) = &self.reranker {
            ranked = match reranker.rerank(ranked, query).await {
                Ok(reordered) => reordered,
                Err((original, e)) => {
                    warn!(error = %e, "rerank failed, keeping scorer order");
                    original
                }
            };
        }

        let (briefing, strategy) = self.fusion.fuse(&ranked, query).await;
        let used_turn_ids = match strategy {
            FusionStrategy::NoMemory => Vec::new(),
            _ => ranked
                .iter()
                .take(self.fusion.candidate_budget())
                .map(|c| TurnId(c.turn.id.clone()))
                .collect(),
        };

        debug!(
            profile = %profile,
            strategy = %strategy,
            used = used_turn_ids.len(),
            "context assembled"
        );
        Ok(ContextResult {
            briefing,
            used_turn_ids,
            strategy,
        })
    }

    /// Turns for one session in positional order.
    pub async fn get_turns(
        &self,
        session_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Turn>, EngramError> {
        self.database_breaker
            .call(|| turns::get_turns_for_session(&self.db, session_id, limit))
            .await
    }

    /// Fetch one session, if present.
    pub async fn get_session(&self, id: &str) -> Result<Option<Session>, EngramError> {
        self.database_breaker
            .call(|| sessions::get_session(&self.db, id))
            .await
    }

    /// All sessions, most recently active first.
    pub async fn list_sessions(&self) -> Result<Vec<Session>, EngramError> {
        self.database_breaker
            .call(|| sessions::list_sessions(&self.db))
            .await
    }

    /// Delete a session and its turns. Returns the number of turns removed.
    pub async fn purge_session(&self, id: &str) -> Result<i64, EngramError> {
        self.database_breaker
            .call(|| sessions::purge_session(&self.db, id))
            .await
    }

    /// Force every breaker back to Closed, for post-incident recovery.
    pub fn reset_breakers(&self) {
        self.embedding_breaker.reset();
        self.fusion_breaker.reset();
        self.database_breaker.reset();
    }

    /// Breaker snapshots for operators.
    pub fn metrics(&self) -> EngineMetrics {
        EngineMetrics {
            embedding: self.embedding_breaker.metrics(),
            fusion: self.fusion_breaker.metrics(),
            database: self.database_breaker.metrics(),
        }
    }

    /// Embed text through the embedding breaker and retry policy.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EngramError> {
        self.retry
            .run(|| self.embedding_breaker.call(|| self.embedder.embed(text)))
            .await
    }

    /// Run one operation under the configured deadline. Expiry abandons the
    /// in-flight future and discards any partial result.
    async fn with_deadline<T>(
        &self,
        fut: impl Future<Output = Result<T, EngramError>>,
    ) -> Result<T, EngramError> {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(EngramError::DeadlineExceeded {
                deadline: self.operation_timeout,
            }),
        }
    }
}
