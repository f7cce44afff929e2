// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for the Engram memory engine.
//!
//! Every call the engine makes to an external dependency (embedding
//! provider, fusion provider, database) is wrapped by a per-dependency
//! [`CircuitBreaker`] and, for transient failures, a bounded
//! exponential-backoff [`RetryPolicy`].

pub mod breaker;
pub mod retry;

pub use breaker::{BreakerMetrics, BreakerSettings, CircuitBreaker, CircuitState};
pub use retry::RetryPolicy;
