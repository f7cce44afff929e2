// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval orchestration for the Engram memory engine.
//!
//! Hosts the full `get_context` pipeline: query profile detection,
//! multi-dimensional scoring, the optional LLM rerank stage, and the
//! three-tier fusion cascade, all behind the [`MemoryEngine`] boundary.

pub mod engine;
pub mod fusion;
pub mod profile;
pub mod reranker;
pub mod scorer;
pub mod types;

pub use engine::{EngineMetrics, MemoryEngine};
pub use fusion::FusionEngine;
pub use profile::QueryProfile;
pub use reranker::Reranker;
pub use scorer::Scorer;
pub use types::{Candidate, ContextResult, FusionStrategy, ScoreBreakdown};
