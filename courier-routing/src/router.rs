//! The routing decision engine.
//!
//! `Router::send` picks a provider from live health, usage, and latency
//! signals, attempts delivery through the provider's circuit breaker, records
//! the outcome into the shared store, and fails over to the alternate
//! provider inside a bounded attempt loop.
//!
//! Routers hold no routing state of their own: every signal is read from and
//! written to the [`RoutingStore`], so any number of router instances (in
//! this process or others) make consistent decisions. Expected failures
//! travel as values through [`RoutingError`]; only store outages cut the
//! send short from anywhere in the loop.

use std::{sync::Arc, time::Instant};

use courier_common::EmailRequest;
use tracing::{debug, error, info, warn};

use crate::{
    circuit_breaker::CircuitBreaker,
    error::RoutingError,
    policy::RoutingPolicy,
    provider::{Provider, ProviderId},
    store::RoutingStore,
};

/// Routes outbound sends across the two-provider set.
pub struct Router {
    /// The delivery set, in tie-break preference order: index 0 wins latency
    /// ties.
    providers: [Arc<dyn Provider>; 2],
    store: Arc<dyn RoutingStore>,
    breaker: Arc<CircuitBreaker>,
    policy: RoutingPolicy,
}

impl Router {
    /// Create a router over a provider pair.
    ///
    /// The breaker must be the per-process singleton shared by every router
    /// driving the same providers, so concurrent sends share failure
    /// counting.
    #[must_use]
    pub fn new(
        providers: [Arc<dyn Provider>; 2],
        store: Arc<dyn RoutingStore>,
        breaker: Arc<CircuitBreaker>,
        policy: RoutingPolicy,
    ) -> Self {
        Self {
            providers,
            store,
            breaker,
            policy,
        }
    }

    /// Route one email, returning the provider that delivered it.
    ///
    /// Up to `max_retries` attempts; recoverable failures (breaker open,
    /// adapter error) fail over to the next healthy provider, fatal ones
    /// (`NoHealthyProvider`, store outage) surface immediately.
    pub async fn send(&self, request: &EmailRequest) -> Result<ProviderId, RoutingError> {
        let mut current = self.choose_provider().await?;
        let mut last_error: Option<RoutingError> = None;

        for attempt in 1..=self.policy.max_retries {
            let provider = Arc::clone(&current);
            let id = provider.id();

            // Skip a doomed call: the health flag is advisory, but once a
            // healthy alternative exists there is no reason to try an
            // unhealthy provider.
            if !self.store.is_healthy(id).await? {
                warn!(provider = %id, attempt, "provider marked unhealthy, switching");
                current = self.next_healthy_provider(id).await?;
                continue;
            }

            if !self.breaker.allow_request(id) {
                warn!(provider = %id, attempt, "circuit open, not attempting send");
                self.store.set_unhealthy(id).await?;
                last_error = Some(RoutingError::BreakerOpen(id));
                if attempt == self.policy.max_retries {
                    break;
                }
                current = self.next_healthy_provider(id).await?;
                continue;
            }

            debug!(provider = %id, attempt, to = %request.to, "attempting send");
            let started = Instant::now();

            match provider.send(request).await {
                Ok(()) => {
                    let latency = started.elapsed().as_secs_f64();
                    self.breaker.record_success(id);
                    self.record_success(id, latency).await?;
                    info!(
                        provider = %id,
                        latency_secs = format_args!("{latency:.3}"),
                        attempt,
                        "email delivered"
                    );
                    return Ok(id);
                }
                Err(source) => {
                    self.breaker.record_failure(id);
                    self.store.set_unhealthy(id).await?;
                    error!(provider = %id, attempt, error = %source, "send failed");
                    last_error = Some(RoutingError::ProviderSend {
                        provider: id,
                        source,
                    });
                    if attempt == self.policy.max_retries {
                        break;
                    }
                    current = self.next_healthy_provider(id).await?;
                }
            }
        }

        Err(RoutingError::RetriesExhausted {
            attempts: self.policy.max_retries,
            last_error: Box::new(last_error.unwrap_or(RoutingError::NoHealthyProvider)),
        })
    }

    /// Pick the starting provider for a send.
    ///
    /// Rotation takes precedence over latency: a provider at the
    /// consecutive-use limit yields to the other one when it is healthy.
    /// This never fails with `NoHealthyProvider` — during a total outage it
    /// still nominates a candidate and lets the attempt loop decide.
    async fn choose_provider(&self) -> Result<Arc<dyn Provider>, RoutingError> {
        for provider in &self.providers {
            let id = provider.id();
            let other = id.other();
            let uses = self.store.consecutive_use_count(id).await?;
            if self.policy.should_rotate(uses) && self.store.is_healthy(other).await? {
                info!(
                    from = %id,
                    to = %other,
                    consecutive_uses = uses,
                    "consecutive-use limit reached, rotating provider"
                );
                if let Some(alternate) = self.provider_for(other) {
                    return Ok(alternate);
                }
            }
        }

        self.choose_lower_latency().await
    }

    /// Latency tie-break: lower predicted (median) latency wins, ties go to
    /// the first-listed provider.
    async fn choose_lower_latency(&self) -> Result<Arc<dyn Provider>, RoutingError> {
        let first = &self.providers[0];
        let second = &self.providers[1];

        let first_latency = self.store.predicted_latency(first.id()).await?;
        let second_latency = self.store.predicted_latency(second.id()).await?;
        debug!(
            first = %first.id(),
            first_latency_secs = first_latency,
            second = %second.id(),
            second_latency_secs = second_latency,
            "comparing predicted latencies"
        );

        Ok(if first_latency <= second_latency {
            Arc::clone(first)
        } else {
            Arc::clone(second)
        })
    }

    /// The next healthy provider, excluding the one that just failed.
    ///
    /// Unlike `choose_provider`, this is allowed to fail: when every
    /// candidate is unhealthy, retrying cannot help and the send aborts
    /// with `NoHealthyProvider`.
    async fn next_healthy_provider(
        &self,
        failed: ProviderId,
    ) -> Result<Arc<dyn Provider>, RoutingError> {
        for provider in &self.providers {
            let id = provider.id();
            if id != failed && self.store.is_healthy(id).await? {
                info!(provider = %id, "failing over to healthy provider");
                return Ok(Arc::clone(provider));
            }
        }

        error!("no healthy providers available");
        Err(RoutingError::NoHealthyProvider)
    }

    fn provider_for(&self, id: ProviderId) -> Option<Arc<dyn Provider>> {
        self.providers
            .iter()
            .find(|provider| provider.id() == id)
            .map(Arc::clone)
    }

    /// Post-success bookkeeping: latency sample, send count, health
    /// re-derivation, and the consecutive-use record.
    ///
    /// A store outage here is fatal for the call even though the email went
    /// out; converting it into a retry would risk a duplicate send.
    async fn record_success(&self, id: ProviderId, latency: f64) -> Result<(), RoutingError> {
        self.store.record_latency(id, latency).await?;
        let sent = self.store.increment_send_count(id).await?;

        if self.policy.within_threshold(latency) {
            self.store.set_healthy(id).await?;
        } else {
            warn!(
                provider = %id,
                latency_secs = format_args!("{latency:.3}"),
                threshold_secs = self.policy.latency_threshold_secs,
                "latency exceeded threshold, marking provider unhealthy"
            );
            self.store.set_unhealthy(id).await?;
        }

        self.store.record_use(id).await?;
        self.log_predicted_latencies(id, sent).await?;
        Ok(())
    }

    /// Report both providers' predicted latencies after a send.
    async fn log_predicted_latencies(
        &self,
        delivered_by: ProviderId,
        total_sent: u64,
    ) -> Result<(), RoutingError> {
        let first = self.providers[0].id();
        let second = self.providers[1].id();
        let first_latency = self.store.predicted_latency(first).await?;
        let second_latency = self.store.predicted_latency(second).await?;

        info!(
            delivered_by = %delivered_by,
            total_sent,
            first = %first,
            first_predicted_secs = first_latency,
            second = %second,
            second_predicted_secs = second_latency,
            "provider latency report"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field(
                "providers",
                &[self.providers[0].id(), self.providers[1].id()],
            )
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
