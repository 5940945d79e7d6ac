//! Routing scenarios for the decision engine.

mod support;

use std::{sync::Arc, time::Duration};

use courier_common::EmailRequest;
use courier_routing::{
    CircuitBreaker, CircuitBreakerConfig, MemoryRoutingStore, Provider, ProviderId, Router,
    RoutingError, RoutingPolicy, RoutingStore, SendError,
};
use support::MockProvider;

fn request() -> EmailRequest {
    EmailRequest {
        to: "recipient@example.com".to_string(),
        subject: "Routing test".to_string(),
        body: "<p>Hello</p>".to_string(),
        from_email: None,
    }
}

fn router(
    sendgrid: &Arc<MockProvider>,
    ses: &Arc<MockProvider>,
    store: &Arc<MemoryRoutingStore>,
    breaker: &Arc<CircuitBreaker>,
    policy: RoutingPolicy,
) -> Router {
    Router::new(
        [
            Arc::clone(sendgrid) as Arc<dyn Provider>,
            Arc::clone(ses) as Arc<dyn Provider>,
        ],
        Arc::clone(store) as Arc<dyn RoutingStore>,
        Arc::clone(breaker),
        policy,
    )
}

#[tokio::test]
async fn test_first_send_prefers_default_provider() {
    // Fresh providers: both healthy, no latency history, no usage. The
    // latency tie breaks toward the first-listed provider.
    let sendgrid = MockProvider::succeeding(ProviderId::SendGrid);
    let ses = MockProvider::succeeding(ProviderId::AmazonSes);
    let store = Arc::new(MemoryRoutingStore::new());
    let breaker = Arc::new(CircuitBreaker::default());
    let router = router(&sendgrid, &ses, &store, &breaker, RoutingPolicy::default());

    let delivered = router.send(&request()).await.unwrap();

    assert_eq!(delivered, ProviderId::SendGrid);
    assert_eq!(sendgrid.calls(), 1);
    assert_eq!(ses.calls(), 0);
}

#[tokio::test]
async fn test_lower_latency_provider_wins() {
    let sendgrid = MockProvider::succeeding(ProviderId::SendGrid);
    let ses = MockProvider::succeeding(ProviderId::AmazonSes);
    let store = Arc::new(MemoryRoutingStore::new());
    let breaker = Arc::new(CircuitBreaker::default());

    for _ in 0..3 {
        store
            .record_latency(ProviderId::SendGrid, 1.5)
            .await
            .unwrap();
        store
            .record_latency(ProviderId::AmazonSes, 0.2)
            .await
            .unwrap();
    }

    let router = router(&sendgrid, &ses, &store, &breaker, RoutingPolicy::default());
    let delivered = router.send(&request()).await.unwrap();

    assert_eq!(delivered, ProviderId::AmazonSes);
}

#[tokio::test]
async fn test_empty_history_never_preferred() {
    // Amazon SES is slow but has real data; SendGrid has none and predicts
    // infinite latency, so it must not be preferred.
    let sendgrid = MockProvider::succeeding(ProviderId::SendGrid);
    let ses = MockProvider::succeeding(ProviderId::AmazonSes);
    let store = Arc::new(MemoryRoutingStore::new());
    let breaker = Arc::new(CircuitBreaker::default());

    store
        .record_latency(ProviderId::AmazonSes, 5.0)
        .await
        .unwrap();

    let router = router(&sendgrid, &ses, &store, &breaker, RoutingPolicy::default());
    let delivered = router.send(&request()).await.unwrap();

    assert_eq!(delivered, ProviderId::AmazonSes);
}

#[tokio::test]
async fn test_rotation_overrides_lower_latency() {
    // SendGrid has been used max_consecutive_use times and has the lower
    // latency; the healthy alternate must still be forced next.
    let sendgrid = MockProvider::succeeding(ProviderId::SendGrid);
    let ses = MockProvider::succeeding(ProviderId::AmazonSes);
    let store = Arc::new(MemoryRoutingStore::new());
    let breaker = Arc::new(CircuitBreaker::default());
    let policy = RoutingPolicy {
        max_consecutive_use: 5,
        ..RoutingPolicy::default()
    };

    for _ in 0..3 {
        store
            .record_latency(ProviderId::SendGrid, 0.1)
            .await
            .unwrap();
        store
            .record_latency(ProviderId::AmazonSes, 1.0)
            .await
            .unwrap();
    }
    for _ in 0..5 {
        store.record_use(ProviderId::SendGrid).await.unwrap();
    }

    let router = router(&sendgrid, &ses, &store, &breaker, policy);
    let delivered = router.send(&request()).await.unwrap();

    assert_eq!(delivered, ProviderId::AmazonSes);
    assert_eq!(sendgrid.calls(), 0);

    // The rotation also resets SendGrid's counter through record_use.
    assert_eq!(
        store
            .consecutive_use_count(ProviderId::SendGrid)
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        store
            .consecutive_use_count(ProviderId::AmazonSes)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_failover_to_alternate_on_send_failure() {
    let sendgrid = MockProvider::with_outcomes(
        ProviderId::SendGrid,
        vec![Err(SendError::Rejected { status: 500 })],
    );
    let ses = MockProvider::succeeding(ProviderId::AmazonSes);
    let store = Arc::new(MemoryRoutingStore::new());
    let breaker = Arc::new(CircuitBreaker::default());
    let router = router(&sendgrid, &ses, &store, &breaker, RoutingPolicy::default());

    let delivered = router.send(&request()).await.unwrap();

    assert_eq!(delivered, ProviderId::AmazonSes);
    assert_eq!(sendgrid.calls(), 1);
    assert_eq!(ses.calls(), 1);
    assert!(!store.is_healthy(ProviderId::SendGrid).await.unwrap());
    assert!(store.is_healthy(ProviderId::AmazonSes).await.unwrap());
}

#[tokio::test]
async fn test_unhealthy_provider_skipped_without_network_call() {
    let sendgrid = MockProvider::succeeding(ProviderId::SendGrid);
    let ses = MockProvider::succeeding(ProviderId::AmazonSes);
    let store = Arc::new(MemoryRoutingStore::new());
    let breaker = Arc::new(CircuitBreaker::default());

    store.set_unhealthy(ProviderId::SendGrid).await.unwrap();

    let router = router(&sendgrid, &ses, &store, &breaker, RoutingPolicy::default());
    let delivered = router.send(&request()).await.unwrap();

    assert_eq!(delivered, ProviderId::AmazonSes);
    assert_eq!(sendgrid.calls(), 0);
}

#[tokio::test]
async fn test_all_providers_unhealthy_is_fatal_without_send() {
    let sendgrid = MockProvider::succeeding(ProviderId::SendGrid);
    let ses = MockProvider::succeeding(ProviderId::AmazonSes);
    let store = Arc::new(MemoryRoutingStore::new());
    let breaker = Arc::new(CircuitBreaker::default());

    store.set_unhealthy(ProviderId::SendGrid).await.unwrap();
    store.set_unhealthy(ProviderId::AmazonSes).await.unwrap();

    let router = router(&sendgrid, &ses, &store, &breaker, RoutingPolicy::default());
    let error = router.send(&request()).await.unwrap_err();

    assert!(matches!(error, RoutingError::NoHealthyProvider));
    assert!(error.is_fatal());
    assert_eq!(sendgrid.calls(), 0);
    assert_eq!(ses.calls(), 0);
}

#[tokio::test]
async fn test_open_breaker_fast_fails_without_invoking_adapter() {
    let sendgrid = MockProvider::succeeding(ProviderId::SendGrid);
    let ses = MockProvider::succeeding(ProviderId::AmazonSes);
    let store = Arc::new(MemoryRoutingStore::new());
    let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: 1,
        reset_timeout_secs: 60,
    }));

    // Trip SendGrid's circuit; the next send must not reach its adapter.
    breaker.record_failure(ProviderId::SendGrid);

    let router = router(&sendgrid, &ses, &store, &breaker, RoutingPolicy::default());
    let delivered = router.send(&request()).await.unwrap();

    assert_eq!(delivered, ProviderId::AmazonSes);
    assert_eq!(sendgrid.calls(), 0);
    assert!(!store.is_healthy(ProviderId::SendGrid).await.unwrap());
}

#[tokio::test]
async fn test_retries_exhausted_attaches_last_error() {
    let sendgrid = MockProvider::failing(ProviderId::SendGrid);
    let ses = MockProvider::failing(ProviderId::AmazonSes);
    let store = Arc::new(MemoryRoutingStore::new());
    let breaker = Arc::new(CircuitBreaker::default());
    let policy = RoutingPolicy {
        max_retries: 2,
        ..RoutingPolicy::default()
    };

    let router = router(&sendgrid, &ses, &store, &breaker, policy);
    let error = router.send(&request()).await.unwrap_err();

    match error {
        RoutingError::RetriesExhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 2);
            assert!(matches!(
                *last_error,
                RoutingError::ProviderSend {
                    provider: ProviderId::AmazonSes,
                    ..
                }
            ));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }

    // One attempt per provider, both marked unhealthy.
    assert_eq!(sendgrid.calls(), 1);
    assert_eq!(ses.calls(), 1);
    assert!(!store.is_healthy(ProviderId::SendGrid).await.unwrap());
    assert!(!store.is_healthy(ProviderId::AmazonSes).await.unwrap());
}

#[tokio::test]
async fn test_slow_success_marks_provider_unhealthy() {
    // The slow-is-unhealthy rule: a successful send over the latency
    // threshold still flips the health flag.
    let sendgrid = MockProvider::with_delay(ProviderId::SendGrid, Duration::from_millis(25));
    let ses = MockProvider::succeeding(ProviderId::AmazonSes);
    let store = Arc::new(MemoryRoutingStore::new());
    let breaker = Arc::new(CircuitBreaker::default());
    let policy = RoutingPolicy {
        latency_threshold_secs: 0.001,
        ..RoutingPolicy::default()
    };

    let router = router(&sendgrid, &ses, &store, &breaker, policy);
    let delivered = router.send(&request()).await.unwrap();

    assert_eq!(delivered, ProviderId::SendGrid);
    assert!(!store.is_healthy(ProviderId::SendGrid).await.unwrap());

    // The sample was still recorded.
    let predicted = store.predicted_latency(ProviderId::SendGrid).await.unwrap();
    assert!(predicted.is_finite());
    assert!(predicted > 0.0);
}

#[tokio::test]
async fn test_success_within_threshold_restores_health() {
    let sendgrid = MockProvider::succeeding(ProviderId::SendGrid);
    let ses = MockProvider::succeeding(ProviderId::AmazonSes);
    let store = Arc::new(MemoryRoutingStore::new());
    let breaker = Arc::new(CircuitBreaker::default());

    // Previously unhealthy, but no healthy alternative forces a skip once
    // SES is unhealthy too... keep SES healthy and force SendGrid via
    // latency data instead.
    store
        .record_latency(ProviderId::SendGrid, 0.1)
        .await
        .unwrap();
    store
        .record_latency(ProviderId::AmazonSes, 0.9)
        .await
        .unwrap();

    let router = router(&sendgrid, &ses, &store, &breaker, RoutingPolicy::default());
    let delivered = router.send(&request()).await.unwrap();

    assert_eq!(delivered, ProviderId::SendGrid);
    assert!(store.is_healthy(ProviderId::SendGrid).await.unwrap());
    assert_eq!(
        store
            .consecutive_use_count(ProviderId::SendGrid)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_concurrent_sends_share_usage_state() {
    // Routers are stateless: concurrent sends against the same store keep
    // the mutual-reset invariant (only one provider's counter is non-zero).
    let sendgrid = MockProvider::succeeding(ProviderId::SendGrid);
    let ses = MockProvider::succeeding(ProviderId::AmazonSes);
    let store = Arc::new(MemoryRoutingStore::new());
    let breaker = Arc::new(CircuitBreaker::default());
    let router = Arc::new(router(
        &sendgrid,
        &ses,
        &store,
        &breaker,
        RoutingPolicy::default(),
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let router = Arc::clone(&router);
        handles.push(tokio::spawn(
            async move { router.send(&request()).await },
        ));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let sendgrid_uses = store
        .consecutive_use_count(ProviderId::SendGrid)
        .await
        .unwrap();
    let ses_uses = store
        .consecutive_use_count(ProviderId::AmazonSes)
        .await
        .unwrap();
    assert!(sendgrid_uses == 0 || ses_uses == 0);
    assert_eq!(sendgrid.calls() + ses.calls(), 8);
}
