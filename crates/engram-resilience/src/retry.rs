// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded exponential-backoff retry for transient-classified failures.
//!
//! Only errors for which [`EngramError::is_transient`] holds are retried;
//! permanent failures (auth, malformed input) surface immediately.

use std::future::Future;
use std::time::Duration;

use engram_config::ResilienceConfig;
use engram_core::EngramError;
use tracing::warn;

/// Retry policy with bounded exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Re-attempts after the first call (total attempts = max_retries + 1).
    pub max_retries: u32,
    /// Delay before the first re-attempt; doubles each attempt.
    pub base_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// A policy that never re-attempts, for tests and fail-fast paths.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Backoff delay before re-attempt number `retry` (1-based).
    fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op`, re-attempting transient failures up to the retry budget.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, EngramError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EngramError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    warn!(attempt, ?delay, error = %e, "transient failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ResilienceConfig::default())
    }
}
