//! Selection policy knobs for the router.
//!
//! The rotation rule keeps one provider from monopolising traffic even when
//! it has the lower latency, which also exercises the backup path often
//! enough to trust it during a failover. The latency threshold is the
//! slow-is-unhealthy rule: a successful send that takes too long still flips
//! the provider's health flag.

use serde::{Deserialize, Serialize};

/// Routing policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingPolicy {
    /// Observed latency (seconds) above which a successful send still marks
    /// the provider unhealthy.
    #[serde(default = "defaults::latency_threshold_secs")]
    pub latency_threshold_secs: f64,

    /// Consecutive selections of one provider before the other must be
    /// chosen (when healthy), regardless of latency.
    #[serde(default = "defaults::max_consecutive_use")]
    pub max_consecutive_use: u64,

    /// Bounded number of delivery attempts per send.
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            latency_threshold_secs: defaults::latency_threshold_secs(),
            max_consecutive_use: defaults::max_consecutive_use(),
            max_retries: defaults::max_retries(),
        }
    }
}

impl RoutingPolicy {
    /// Whether a consecutive-use count has reached the rotation limit.
    #[must_use]
    pub const fn should_rotate(&self, consecutive_uses: u64) -> bool {
        consecutive_uses >= self.max_consecutive_use
    }

    /// Whether an observed latency stays within the health threshold.
    #[must_use]
    pub fn within_threshold(&self, seconds: f64) -> bool {
        seconds <= self.latency_threshold_secs
    }
}

mod defaults {
    pub const fn latency_threshold_secs() -> f64 {
        2.0
    }

    pub const fn max_consecutive_use() -> u64 {
        5
    }

    pub const fn max_retries() -> u32 {
        2
    }
}
