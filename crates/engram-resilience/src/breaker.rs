// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Circuit breaker state machine, one instance per guarded dependency.
//!
//! # States
//! - **Closed**: normal operation, consecutive failures counted
//! - **Open**: calls rejected immediately with `CircuitOpen`, no network attempt
//! - **HalfOpen**: after the cooldown, a limited number of trial calls check for recovery
//!
//! State lives behind an explicit `Mutex` and is never ambient or global;
//! call sites share a breaker by `Arc`. Operator-triggered [`CircuitBreaker::reset`]
//! forces the breaker back to Closed for post-incident recovery.

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use engram_config::ResilienceConfig;
use engram_core::EngramError;
use tracing::{info, warn};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, requests pass through.
    Closed,
    /// Dependency is failing, requests rejected immediately.
    Open,
    /// Testing recovery, limited trial requests allowed.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Tunable thresholds for one breaker.
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Consecutive half-open successes needed to close. Also bounds the
    /// number of concurrent half-open trial calls.
    pub success_threshold: u32,
    /// Time the circuit stays open before allowing trial calls.
    pub cooldown: Duration,
}

impl BreakerSettings {
    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            success_threshold: config.success_threshold,
            cooldown: Duration::from_secs(config.cooldown_secs),
        }
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self::from_config(&ResilienceConfig::default())
    }
}

/// Internal state tracking.
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    half_open_inflight: u32,
    last_state_change: Instant,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            half_open_inflight: 0,
            last_state_change: Instant::now(),
        }
    }

    fn transition(&mut self, next: CircuitState) {
        self.state = next;
        self.consecutive_successes = 0;
        self.half_open_inflight = 0;
        self.last_state_change = Instant::now();
    }
}

/// Per-dependency circuit breaker.
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
    // Atomic counters for the metrics snapshot (lock-free reads).
    total_calls: AtomicU64,
    total_rejections: AtomicU64,
}

impl CircuitBreaker {
    /// Creates a breaker for the named dependency.
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            inner: Mutex::new(BreakerInner::new()),
            total_calls: AtomicU64::new(0),
            total_rejections: AtomicU64::new(0),
        }
    }

    /// The dependency this breaker guards.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current circuit state.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("breaker lock poisoned").state
    }

    /// Run `op` through the breaker: reject fast when open, otherwise
    /// execute and record the outcome.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, EngramError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, EngramError>>,
    {
        self.try_acquire()?;
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }

    /// Operator-triggered transition back to Closed.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        info!(breaker = %self.name, from = %inner.state, "manual breaker reset");
        inner.transition(CircuitState::Closed);
        inner.consecutive_failures = 0;
    }

    /// Snapshot of breaker counters for operators.
    pub fn metrics(&self) -> BreakerMetrics {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        BreakerMetrics {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
            time_in_current_state: inner.last_state_change.elapsed(),
        }
    }

    /// Check whether a call may proceed, transitioning Open -> HalfOpen
    /// after the cooldown. Returns `CircuitOpen` when the call must not run.
    fn try_acquire(&self) -> Result<(), EngramError> {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock().expect("breaker lock poisoned");

        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                if inner.last_state_change.elapsed() >= self.settings.cooldown {
                    info!(
                        breaker = %self.name,
                        cooldown = ?self.settings.cooldown,
                        "breaker half-open after cooldown"
                    );
                    inner.transition(CircuitState::HalfOpen);
                    inner.half_open_inflight = 1;
                    Ok(())
                } else {
                    self.total_rejections.fetch_add(1, Ordering::Relaxed);
                    Err(EngramError::CircuitOpen {
                        dependency: self.name.clone(),
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_inflight < self.settings.success_threshold {
                    inner.half_open_inflight += 1;
                    Ok(())
                } else {
                    self.total_rejections.fetch_add(1, Ordering::Relaxed);
                    Err(EngramError::CircuitOpen {
                        dependency: self.name.clone(),
                    })
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.consecutive_failures = 0;
        inner.consecutive_successes += 1;
        if inner.half_open_inflight > 0 {
            inner.half_open_inflight -= 1;
        }

        if inner.state == CircuitState::HalfOpen
            && inner.consecutive_successes >= self.settings.success_threshold
        {
            info!(
                breaker = %self.name,
                successes = inner.consecutive_successes,
                "breaker closed after successful trials"
            );
            inner.transition(CircuitState::Closed);
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.consecutive_successes = 0;
        inner.consecutive_failures += 1;

        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures >= self.settings.failure_threshold {
                    warn!(
                        breaker = %self.name,
                        failures = inner.consecutive_failures,
                        "breaker opened"
                    );
                    inner.transition(CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                // A single trial failure reopens the circuit.
                warn!(breaker = %self.name, "trial call failed, breaker reopened");
                inner.transition(CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }
}

/// Metrics snapshot for monitoring.
#[derive(Debug, Clone)]
pub struct BreakerMetrics {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub total_calls: u64,
    pub total_rejections: u64,
    pub time_in_current_state: Duration,
}
