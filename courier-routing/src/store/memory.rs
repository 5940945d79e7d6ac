use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{DEFAULT_LATENCY_HISTORY_SIZE, RoutingStore, median};
use crate::{error::StoreError, provider::ProviderId};

/// Mutex-guarded in-memory tables.
#[derive(Debug, Default)]
struct Tables {
    /// Newest-first latency samples, trimmed to the history size.
    latency: HashMap<ProviderId, VecDeque<f64>>,
    send_count: HashMap<ProviderId, u64>,
    usage: HashMap<ProviderId, u64>,
    /// Providers with an explicit unhealthy record; absence reads healthy.
    unhealthy: HashSet<ProviderId>,
}

/// In-memory routing store.
///
/// Single-process stand-in for the shared backend, behind the same
/// interface. Used for tests and deployments without a configured store
/// URL; multi-instance deployments need [`super::RedisRoutingStore`] so all
/// routers see the same state.
#[derive(Debug)]
pub struct MemoryRoutingStore {
    tables: Mutex<Tables>,
    history_size: usize,
}

impl MemoryRoutingStore {
    /// Create an empty store with the default latency history size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_history_size(DEFAULT_LATENCY_HISTORY_SIZE)
    }

    /// Create an empty store retaining `history_size` latency samples per
    /// provider.
    #[must_use]
    pub fn with_history_size(history_size: usize) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            history_size,
        }
    }
}

impl Default for MemoryRoutingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoutingStore for MemoryRoutingStore {
    async fn record_latency(&self, provider: ProviderId, seconds: f64) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let series = tables.latency.entry(provider).or_default();
        series.push_front(seconds);
        series.truncate(self.history_size);
        Ok(())
    }

    async fn predicted_latency(&self, provider: ProviderId) -> Result<f64, StoreError> {
        let tables = self.tables.lock();
        let samples: Vec<f64> = tables
            .latency
            .get(&provider)
            .map(|series| series.iter().copied().collect())
            .unwrap_or_default();
        Ok(median(&samples))
    }

    async fn increment_send_count(&self, provider: ProviderId) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock();
        let count = tables.send_count.entry(provider).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn record_use(&self, provider: ProviderId) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        *tables.usage.entry(provider).or_insert(0) += 1;
        tables.usage.insert(provider.other(), 0);
        Ok(())
    }

    async fn consecutive_use_count(&self, provider: ProviderId) -> Result<u64, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.usage.get(&provider).copied().unwrap_or(0))
    }

    async fn set_healthy(&self, provider: ProviderId) -> Result<(), StoreError> {
        self.tables.lock().unhealthy.remove(&provider);
        Ok(())
    }

    async fn set_unhealthy(&self, provider: ProviderId) -> Result<(), StoreError> {
        self.tables.lock().unhealthy.insert(provider);
        Ok(())
    }

    async fn is_healthy(&self, provider: ProviderId) -> Result<bool, StoreError> {
        Ok(!self.tables.lock().unhealthy.contains(&provider))
    }
}
