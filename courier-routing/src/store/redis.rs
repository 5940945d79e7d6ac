use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};

use super::{DEFAULT_LATENCY_HISTORY_SIZE, RoutingStore, median};
use crate::{error::StoreError, provider::ProviderId};

const LATENCY_KEY: &str = "courier:latency";
const SEND_COUNT_KEY: &str = "courier:send_count";
const USAGE_KEY: &str = "courier:usage";
const HEALTH_KEY: &str = "courier:health";

const UNHEALTHY: &str = "unhealthy";
const HEALTHY: &str = "healthy";

/// Redis-backed routing store.
///
/// The shared backend for multi-instance deployments: latency samples live
/// in one list per provider (LPUSH + LTRIM keeps the rolling window),
/// counters and health flags in hashes with the provider name as field.
/// Each operation is a single-key command, atomic on the Redis side.
///
/// Connection failures surface as [`StoreError::Unavailable`]; nothing here
/// falls back to a default.
#[derive(Clone)]
pub struct RedisRoutingStore {
    client: Client,
    history_size: usize,
}

impl RedisRoutingStore {
    /// Create a store from a `redis://` URL with the default latency
    /// history size.
    pub fn new(url: &str) -> Result<Self, StoreError> {
        Self::with_history_size(url, DEFAULT_LATENCY_HISTORY_SIZE)
    }

    /// Create a store retaining `history_size` latency samples per
    /// provider.
    pub fn with_history_size(url: &str, history_size: usize) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        Ok(Self {
            client,
            history_size,
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    fn latency_key(provider: ProviderId) -> String {
        format!("{LATENCY_KEY}:{provider}")
    }
}

impl std::fmt::Debug for RedisRoutingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRoutingStore")
            .field("history_size", &self.history_size)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RoutingStore for RedisRoutingStore {
    async fn record_latency(&self, provider: ProviderId, seconds: f64) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let key = Self::latency_key(provider);
        // LPUSH + LTRIM in one round trip keeps the window bounded even
        // when writers race.
        redis::pipe()
            .lpush(&key, seconds)
            .ignore()
            .ltrim(&key, 0, isize::try_from(self.history_size).unwrap_or(isize::MAX) - 1)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn predicted_latency(&self, provider: ProviderId) -> Result<f64, StoreError> {
        let mut conn = self.connection().await?;
        let samples: Vec<f64> = conn.lrange(Self::latency_key(provider), 0, -1).await?;
        Ok(median(&samples))
    }

    async fn increment_send_count(&self, provider: ProviderId) -> Result<u64, StoreError> {
        let mut conn = self.connection().await?;
        let count: u64 = conn.hincr(SEND_COUNT_KEY, provider.as_str(), 1i64).await?;
        Ok(count)
    }

    async fn record_use(&self, provider: ProviderId) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        redis::pipe()
            .hincr(USAGE_KEY, provider.as_str(), 1i64)
            .ignore()
            .hset(USAGE_KEY, provider.other().as_str(), 0i64)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn consecutive_use_count(&self, provider: ProviderId) -> Result<u64, StoreError> {
        let mut conn = self.connection().await?;
        let count: Option<u64> = conn.hget(USAGE_KEY, provider.as_str()).await?;
        Ok(count.unwrap_or(0))
    }

    async fn set_healthy(&self, provider: ProviderId) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: () = conn.hset(HEALTH_KEY, provider.as_str(), HEALTHY).await?;
        Ok(())
    }

    async fn set_unhealthy(&self, provider: ProviderId) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: () = conn.hset(HEALTH_KEY, provider.as_str(), UNHEALTHY).await?;
        Ok(())
    }

    async fn is_healthy(&self, provider: ProviderId) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let flag: Option<String> = conn.hget(HEALTH_KEY, provider.as_str()).await?;
        // Absence of an explicit unhealthy record reads healthy.
        Ok(flag.as_deref() != Some(UNHEALTHY))
    }
}
