// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared HTTP plumbing for provider clients.
//!
//! Builds the authenticated `reqwest::Client` and classifies failures into
//! the transient/permanent halves of the error taxonomy. No retries happen
//! here — the resilience layer owns retry policy.

use std::time::Duration;

use engram_core::EngramError;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use crate::types::ApiErrorResponse;

/// Build a reqwest client with bearer auth and a per-request timeout.
pub fn build_http_client(
    api_key: &str,
    timeout: Duration,
) -> Result<reqwest::Client, EngramError> {
    let mut headers = HeaderMap::new();
    if !api_key.is_empty() {
        let mut value = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| EngramError::Config(format!("invalid API key header value: {e}")))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    headers.insert(
        "content-type",
        HeaderValue::from_static("application/json"),
    );

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| EngramError::Permanent {
            message: format!("failed to build HTTP client: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Returns true for HTTP status codes that indicate transient failures.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504 | 529)
}

/// Map a reqwest transport error. Timeouts and connection failures are
/// transient; anything else (request construction, redirect loops) is not.
pub fn map_transport_err(e: reqwest::Error) -> EngramError {
    if e.is_timeout() || e.is_connect() {
        EngramError::Transient {
            message: format!("HTTP request failed: {e}"),
            source: Some(Box::new(e)),
        }
    } else {
        EngramError::Permanent {
            message: format!("HTTP request failed: {e}"),
            source: Some(Box::new(e)),
        }
    }
}

/// Map a non-success response status plus body into an error, decoding the
/// provider's error envelope when present.
pub fn map_status_err(status: StatusCode, body: &str) -> EngramError {
    let message = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) if !api_err.error.type_.is_empty() => format!(
            "provider error ({}): {}",
            api_err.error.type_, api_err.error.message
        ),
        Ok(api_err) => format!("provider error: {}", api_err.error.message),
        Err(_) => format!("provider returned {status}: {body}"),
    };

    if is_transient_status(status) {
        EngramError::Transient {
            message,
            source: None,
        }
    } else {
        EngramError::Permanent {
            message,
            source: None,
        }
    }
}

/// Truncate text to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
