//! A scripted in-memory provider for routing scenarios.
//!
//! Outcomes are queued up front; each `send` pops the next one and falls
//! back to success once the script is exhausted. The invocation counter
//! lets tests assert that fast-fail paths never reach the adapter.

#![allow(dead_code)] // Test utility module - not all constructors used in every test

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use courier_common::EmailRequest;
use courier_routing::{Provider, ProviderId, SendError};
use parking_lot::Mutex;

pub struct MockProvider {
    id: ProviderId,
    script: Mutex<VecDeque<Result<(), SendError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockProvider {
    /// A provider that succeeds on every call.
    pub fn succeeding(id: ProviderId) -> Arc<Self> {
        Self::with_outcomes(id, Vec::new())
    }

    /// A provider that fails the next 16 calls with a transport error.
    pub fn failing(id: ProviderId) -> Arc<Self> {
        Self::with_outcomes(
            id,
            (0..16)
                .map(|_| Err(SendError::Transport("simulated outage".to_string())))
                .collect(),
        )
    }

    /// A provider that plays back `outcomes` in order, then succeeds.
    pub fn with_outcomes(id: ProviderId, outcomes: Vec<Result<(), SendError>>) -> Arc<Self> {
        Arc::new(Self {
            id,
            script: Mutex::new(outcomes.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    /// A provider whose every send takes `delay` before succeeding.
    pub fn with_delay(id: ProviderId, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id,
            script: Mutex::new(VecDeque::new()),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        })
    }

    /// Number of times `send` was invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn send(&self, _request: &EmailRequest) -> Result<(), SendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script.lock().pop_front().unwrap_or(Ok(()))
    }
}
