// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Engram memory engine.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all Engram crates.
///
/// The retry layer consults [`EngramError::is_transient`] to decide whether a
/// failure is worth another attempt; everything else is surfaced immediately.
#[derive(Debug, Error)]
pub enum EngramError {
    /// Configuration errors (invalid TOML, weight table not summing to 1.0,
    /// zero embedding dimension).
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller-supplied input rejected before any provider call is attempted
    /// (empty turn text, empty query, unknown role).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Storage backend errors (database connection, query failure,
    /// transaction rollback).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transient provider failure (timeout, rate limit, 5xx). Retryable.
    #[error("transient provider error: {message}")]
    Transient {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Permanent provider failure (auth rejection, malformed request,
    /// unexpected response shape). Never retried.
    #[error("permanent provider error: {message}")]
    Permanent {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The named dependency is currently short-circuited by its breaker.
    /// No network attempt was made.
    #[error("circuit open for dependency: {dependency}")]
    CircuitOpen { dependency: String },

    /// The caller's deadline expired mid-pipeline. In-flight work was
    /// abandoned and no partial result is returned.
    #[error("deadline exceeded after {deadline:?}")]
    DeadlineExceeded { deadline: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngramError {
    /// Returns true for failures the retry layer may attempt again.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngramError::Transient { .. })
    }

    /// Shorthand for a transient error without an underlying source.
    pub fn transient(message: impl Into<String>) -> Self {
        EngramError::Transient {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a permanent error without an underlying source.
    pub fn permanent(message: impl Into<String>) -> Self {
        EngramError::Permanent {
            message: message.into(),
            source: None,
        }
    }
}
