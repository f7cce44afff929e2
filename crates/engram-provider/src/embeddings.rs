// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote embedding provider speaking the OpenAI-style `/embeddings` API.

use std::time::Duration;

use async_trait::async_trait;
use engram_config::EmbeddingConfig;
use engram_core::{EmbeddingProvider, EngramError};
use tracing::debug;

use crate::client::{build_http_client, map_status_err, map_transport_err, truncate_chars};
use crate::types::{EmbeddingsRequest, EmbeddingsResponse};

/// HTTP client for a remote embedding service.
///
/// Performs exactly one request per `embed` call; retries and circuit
/// breaking are layered on top by the caller.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
    max_input_chars: usize,
}

impl RemoteEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EngramError> {
        let client = build_http_client(
            &config.api_key,
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
            max_input_chars: config.max_input_chars,
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EngramError> {
        let input = truncate_chars(text, self.max_input_chars);
        if input.len() < text.len() {
            debug!(
                original_chars = text.chars().count(),
                max_chars = self.max_input_chars,
                "truncating embedding input"
            );
        }

        let request = EmbeddingsRequest {
            model: self.model.clone(),
            input: input.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(map_transport_err)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_err(status, &body));
        }

        let parsed: EmbeddingsResponse =
            response.json().await.map_err(|e| EngramError::Transient {
                message: format!("malformed embeddings response: {e}"),
                source: Some(Box::new(e)),
            })?;

        let row = parsed.data.into_iter().next().ok_or_else(|| {
            EngramError::Permanent {
                message: "embeddings response contained no vectors".to_string(),
                source: None,
            }
        })?;

        if row.embedding.len() != self.dimension {
            return Err(EngramError::Permanent {
                message: format!(
                    "embedding dimension mismatch: expected {}, got {}",
                    self.dimension,
                    row.embedding.len()
                ),
                source: None,
            });
        }

        Ok(row.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
