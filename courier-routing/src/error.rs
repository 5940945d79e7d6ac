//! Typed error handling for routing operations.
//!
//! The taxonomy distinguishes failures the router recovers from locally by
//! failing over to the alternate provider (`BreakerOpen`, `ProviderSend`)
//! from failures that are fatal for the current send (`NoHealthyProvider`,
//! `Store`, `RetriesExhausted`).

use std::time::Duration;

use thiserror::Error;

use crate::provider::ProviderId;

/// Top-level error type for a routed send.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The provider's circuit breaker rejected the call without attempting
    /// the send. Recovered locally by routing to the alternate provider.
    #[error("circuit breaker open for {0}")]
    BreakerOpen(ProviderId),

    /// The provider adapter's call failed (network, auth, or provider-side
    /// rejection). Recovered locally the same way as `BreakerOpen`.
    #[error("{provider} send failed")]
    ProviderSend {
        /// Provider whose send failed.
        provider: ProviderId,
        /// The underlying adapter failure.
        #[source]
        source: SendError,
    },

    /// Every known provider is unhealthy during a retry iteration. Fatal,
    /// surfaced immediately: retrying cannot produce a candidate.
    #[error("no healthy providers available")]
    NoHealthyProvider,

    /// The shared state backend cannot be reached. Fatal, surfaced
    /// immediately: routing on stale or absent state risks overloading an
    /// already-failing provider.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// All attempts failed without a successful delivery.
    #[error("could not deliver after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The last underlying failure, attached for diagnostics.
        #[source]
        last_error: Box<RoutingError>,
    },
}

impl RoutingError {
    /// Returns `true` if the router recovers from this error locally by
    /// failing over to the alternate provider.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::BreakerOpen(_) | Self::ProviderSend { .. })
    }

    /// Returns `true` if this error terminates the current send.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }
}

/// The shared routing state store could not serve an operation.
///
/// Store operations never silently default: an unreachable backend
/// propagates as `Unavailable` so the router can abort the send.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store cannot be reached.
    #[error("routing state store unavailable: {0}")]
    Unavailable(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(error: redis::RedisError) -> Self {
        Self::Unavailable(error.to_string())
    }
}

/// A provider adapter failed to transmit an email.
///
/// Adapters must signal non-success transport outcomes through this type
/// rather than returning silently.
#[derive(Debug, Error)]
pub enum SendError {
    /// Network-level failure reaching the provider.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider reported a non-success status for the send.
    #[error("provider rejected send with status {status}")]
    Rejected {
        /// HTTP-equivalent status reported by the provider.
        status: u16,
    },

    /// The adapter's own call timeout elapsed.
    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    /// The adapter is misconfigured (missing credentials, bad sender).
    #[error("provider configuration error: {0}")]
    Configuration(String),
}
