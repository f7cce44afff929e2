// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote completion provider speaking the OpenAI-style `/chat/completions`
//! API. Used by the fusion engine and the optional reranker.

use std::time::Duration;

use async_trait::async_trait;
use engram_config::FusionConfig;
use engram_core::types::{CompletionRequest, CompletionResponse};
use engram_core::{CompletionProvider, EngramError};

use crate::client::{build_http_client, map_status_err, map_transport_err};
use crate::types::{ChatRequest, ChatResponse};

/// HTTP client for a remote chat-completion service.
pub struct RemoteCompleter {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl RemoteCompleter {
    pub fn new(config: &FusionConfig) -> Result<Self, EngramError> {
        let client = build_http_client(
            &config.api_key,
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl CompletionProvider for RemoteCompleter {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, EngramError> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(map_transport_err)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_status_err(status, &text));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| EngramError::Transient {
            message: format!("malformed chat response: {e}"),
            source: Some(Box::new(e)),
        })?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            EngramError::Permanent {
                message: "chat response contained no choices".to_string(),
                source: None,
            }
        })?;

        Ok(CompletionResponse {
            content: choice.message.content,
        })
    }
}
