//! Shared routing state store.
//!
//! The store is the single source of truth for routing decisions: rolling
//! latency samples, advisory health flags, consecutive-use counters, and a
//! send-count metric, all keyed per provider. Router instances are stateless
//! and never cache any of this locally, so multiple routers (in one process
//! or many) converge on the same view.
//!
//! Every operation is an idempotent single-key read or write; no cross-key
//! transaction is required because routing tolerates slightly stale reads.
//! An unreachable backend fails loudly as [`StoreError::Unavailable`] rather
//! than silently defaulting.

mod memory;
mod redis;

use async_trait::async_trait;

pub use self::memory::MemoryRoutingStore;
pub use self::redis::RedisRoutingStore;
use crate::{error::StoreError, provider::ProviderId};

/// Default number of latency samples retained per provider.
pub const DEFAULT_LATENCY_HISTORY_SIZE: usize = 10;

/// Key/value contract the router drives.
///
/// Per-provider state is created lazily on first access: an absent key reads
/// as healthy, an empty latency series, and a zero counter.
#[async_trait]
pub trait RoutingStore: Send + Sync {
    /// Prepend an observed send latency (seconds) to the provider's sample
    /// series, evicting the oldest entry beyond the history size.
    async fn record_latency(&self, provider: ProviderId, seconds: f64) -> Result<(), StoreError>;

    /// Median of the provider's stored samples, or `f64::INFINITY` when the
    /// series is empty (never preferred over a provider with real data).
    async fn predicted_latency(&self, provider: ProviderId) -> Result<f64, StoreError>;

    /// Monotonic count of successful sends. Reporting only; routing
    /// decisions never read it.
    async fn increment_send_count(&self, provider: ProviderId) -> Result<u64, StoreError>;

    /// Increment the provider's consecutive-use counter and reset the other
    /// provider's counter to zero.
    async fn record_use(&self, provider: ProviderId) -> Result<(), StoreError>;

    /// Consecutive-use counter, default 0.
    async fn consecutive_use_count(&self, provider: ProviderId) -> Result<u64, StoreError>;

    /// Mark the provider healthy.
    async fn set_healthy(&self, provider: ProviderId) -> Result<(), StoreError>;

    /// Mark the provider unhealthy.
    async fn set_unhealthy(&self, provider: ProviderId) -> Result<(), StoreError>;

    /// Advisory health flag; absence of an explicit unhealthy record reads
    /// as healthy.
    async fn is_healthy(&self, provider: ProviderId) -> Result<bool, StoreError>;
}

/// Median of a sample series; `INFINITY` when empty.
///
/// Even-length series average the two middle samples, matching the usual
/// statistical definition.
pub(crate) fn median(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::INFINITY;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        f64::midpoint(sorted[mid - 1], sorted[mid])
    } else {
        sorted[mid]
    }
}
