//! Per-provider circuit breaker.
//!
//! Protects a failing provider from being hammered by concurrent senders.
//! The breaker reacts faster than the health flag bookkeeping: health is
//! re-derived once per call, while the breaker fails fast as soon as the
//! consecutive-failure threshold trips.
//!
//! # States
//!
//! - **Closed**: normal operation, calls pass through
//! - **Open**: provider assumed down, calls rejected immediately
//! - **Half-Open**: reset timeout elapsed, a trial call is allowed
//!
//! # State Transitions
//!
//! ```text
//! Closed → Open: failure_threshold consecutive failures
//! Open → Half-Open: reset timeout elapsed (checked in allow_request)
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails
//! ```
//!
//! One breaker per provider, shared by every router instance in the
//! process, so concurrent sends race on the same failure counter.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::provider::ProviderId;

/// Configuration for circuit breaker behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures required to open the circuit.
    #[serde(default = "defaults::failure_threshold")]
    pub failure_threshold: u32,

    /// How long the circuit stays open before a trial call is allowed
    /// (seconds).
    #[serde(default = "defaults::reset_timeout_secs")]
    pub reset_timeout_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::failure_threshold(),
            reset_timeout_secs: defaults::reset_timeout_secs(),
        }
    }
}

mod defaults {
    pub const fn failure_threshold() -> u32 {
        3
    }

    pub const fn reset_timeout_secs() -> u64 {
        60
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, calls pass through.
    Closed,
    /// Circuit tripped, calls rejected immediately.
    Open,
    /// Testing recovery, a trial call is allowed.
    HalfOpen,
}

/// Per-provider breaker state. Guarded by a mutex: transitions must be
/// serialized per provider.
#[derive(Debug)]
struct BreakerData {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
}

impl BreakerData {
    const fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
        }
    }

    fn is_reset_timeout_expired(&self, reset_timeout: Duration) -> bool {
        self.opened_at
            .is_some_and(|opened_at| Instant::now().duration_since(opened_at) >= reset_timeout)
    }

    /// Record a failed call. Returns `true` if the circuit transitioned to
    /// Open.
    fn record_failure(&mut self, provider: ProviderId, threshold: u32) -> bool {
        match self.state {
            CircuitState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= threshold {
                    self.state = CircuitState::Open;
                    self.opened_at = Some(Instant::now());
                    tracing::warn!(
                        provider = %provider,
                        failure_count = self.failure_count,
                        threshold,
                        "circuit breaker opened, rejecting sends"
                    );
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                self.state = CircuitState::Open;
                self.opened_at = Some(Instant::now());
                tracing::warn!(
                    provider = %provider,
                    "circuit breaker trial call failed, reopening"
                );
                true
            }
            CircuitState::Open => false,
        }
    }

    /// Record a successful call. Returns `true` if the circuit transitioned
    /// to Closed.
    fn record_success(&mut self, provider: ProviderId) -> bool {
        match self.state {
            CircuitState::Closed => {
                self.failure_count = 0;
                false
            }
            CircuitState::HalfOpen => {
                self.state = CircuitState::Closed;
                self.failure_count = 0;
                self.opened_at = None;
                tracing::info!(
                    provider = %provider,
                    "circuit breaker closed, normal operation resumed"
                );
                true
            }
            CircuitState::Open => {
                tracing::warn!(
                    provider = %provider,
                    "unexpected success while circuit is open"
                );
                false
            }
        }
    }

    /// Whether a call should be allowed through right now.
    fn allow_request(&mut self, provider: ProviderId, reset_timeout: Duration) -> bool {
        match self.state {
            CircuitState::Open => {
                if self.is_reset_timeout_expired(reset_timeout) {
                    self.state = CircuitState::HalfOpen;
                    tracing::info!(
                        provider = %provider,
                        "circuit breaker half-open, allowing trial call"
                    );
                    true
                } else {
                    false
                }
            }
            CircuitState::Closed | CircuitState::HalfOpen => true,
        }
    }
}

/// Per-provider circuit breaker set.
///
/// Breakers are created lazily on first access and live for the process
/// lifetime. Accessed only through `allow_request`/`record_success`/
/// `record_failure`; raw state is never exposed for mutation.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    breakers: DashMap<ProviderId, Arc<parking_lot::Mutex<BreakerData>>>,
}

impl CircuitBreaker {
    /// Create a new breaker set.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    fn breaker(&self, provider: ProviderId) -> Arc<parking_lot::Mutex<BreakerData>> {
        self.breakers
            .entry(provider)
            .or_insert_with(|| Arc::new(parking_lot::Mutex::new(BreakerData::new())))
            .clone()
    }

    const fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.config.reset_timeout_secs)
    }

    /// Check whether a send should be attempted through this provider.
    ///
    /// An open breaker whose reset timeout has elapsed transitions to
    /// half-open here and allows the call as a trial.
    pub fn allow_request(&self, provider: ProviderId) -> bool {
        let breaker = self.breaker(provider);
        let mut guard = breaker.lock();
        guard.allow_request(provider, self.reset_timeout())
    }

    /// Record a successful send. Returns `true` if the circuit recovered to
    /// Closed.
    pub fn record_success(&self, provider: ProviderId) -> bool {
        let breaker = self.breaker(provider);
        let mut guard = breaker.lock();
        guard.record_success(provider)
    }

    /// Record a failed send. Returns `true` if the circuit tripped to Open.
    pub fn record_failure(&self, provider: ProviderId) -> bool {
        let breaker = self.breaker(provider);
        let mut guard = breaker.lock();
        guard.record_failure(provider, self.config.failure_threshold)
    }

    /// Current circuit state for a provider.
    #[must_use]
    pub fn state(&self, provider: ProviderId) -> CircuitState {
        let breaker = self.breaker(provider);
        let guard = breaker.lock();
        guard.state
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
