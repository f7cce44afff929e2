// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider traits at the engine's external seams.
//!
//! The retrieval pipeline only ever talks to embedding and completion
//! services through these traits, so tests substitute deterministic stubs
//! and the resilience layer can wrap any implementation.

use async_trait::async_trait;

use crate::error::EngramError;
use crate::types::{CompletionRequest, CompletionResponse};

/// Turns text into a fixed-length numeric vector via a remote call.
///
/// Implementations are pure boundary adapters: no retries inside — retry
/// policy lives one layer up in the resilience layer.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generates an embedding for the given text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EngramError>;

    /// The fixed dimension every returned vector must have.
    fn dimension(&self) -> usize;
}

/// Chat-style text generation, used by the fusion and rerank stages.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Sends a completion request and returns the generated text.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, EngramError>;
}
