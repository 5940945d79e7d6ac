//! Adaptive routing and failover engine for outbound email.
//!
//! This crate provides the decision core of the courier service:
//! - a shared [`store::RoutingStore`] holding per-provider latency samples,
//!   health flags, and consecutive-usage counters
//! - a per-provider [`circuit_breaker::CircuitBreaker`] that fails fast when
//!   a provider keeps failing
//! - the [`router::Router`], which selects a provider per message and
//!   retries against the alternate on failure

mod circuit_breaker;
mod error;
mod policy;
mod provider;
mod router;
pub mod store;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::{RoutingError, SendError, StoreError};
pub use policy::RoutingPolicy;
pub use provider::{Provider, ProviderId};
pub use router::Router;
pub use store::{MemoryRoutingStore, RedisRoutingStore, RoutingStore};
