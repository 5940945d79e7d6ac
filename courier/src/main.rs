//! Courier: adaptive outbound email routing service.
//!
//! Wires the shared routing store, the circuit breaker singleton, and the
//! two provider adapters into a router, then runs the HTTP ingress and the
//! delivery worker until interrupted.

use std::sync::Arc;

use courier_common::{Signal, logging};
use courier_providers::{SendGridProvider, SesProvider};
use courier_routing::{
    CircuitBreaker, MemoryRoutingStore, Provider, RedisRoutingStore, Router, RoutingStore,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

mod config;
mod http;
mod worker;

use config::CourierConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = CourierConfig::load()?;
    let store = build_store(&config)?;
    let breaker = Arc::new(CircuitBreaker::new(config.breaker.clone()));

    let api_key = std::env::var(&config.providers.sendgrid.api_key_env).map_err(|_| {
        anyhow::anyhow!(
            "SendGrid API key missing from environment variable {}",
            config.providers.sendgrid.api_key_env
        )
    })?;
    let sendgrid = SendGridProvider::new(api_key, config.providers.default_from.clone())?;
    let ses = SesProvider::from_env(
        config.providers.ses.region.clone(),
        config.providers.default_from.clone(),
    )
    .await;

    let router = Arc::new(Router::new(
        [
            Arc::new(sendgrid) as Arc<dyn Provider>,
            Arc::new(ses) as Arc<dyn Provider>,
        ],
        store,
        breaker,
        config.routing.clone(),
    ));

    let (queue_tx, queue_rx) = mpsc::channel(config.server.queue_capacity);
    let (shutdown_tx, _) = broadcast::channel(1);

    let worker_handle = tokio::spawn(worker::run(
        Arc::clone(&router),
        queue_rx,
        shutdown_tx.subscribe(),
    ));

    let server = http::HttpServer::bind(&config.server.listen_address, queue_tx).await?;
    let server_handle = tokio::spawn(server.serve(shutdown_tx.subscribe()));

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    let _ = shutdown_tx.send(Signal::Shutdown);

    server_handle.await??;
    worker_handle.await?;
    info!("shutdown complete");

    Ok(())
}

fn build_store(config: &CourierConfig) -> anyhow::Result<Arc<dyn RoutingStore>> {
    match &config.store.redis_url {
        Some(url) => {
            let store =
                RedisRoutingStore::with_history_size(url, config.store.latency_history_size)?;
            info!(
                history_size = config.store.latency_history_size,
                "using redis routing store"
            );
            Ok(Arc::new(store))
        }
        None => {
            warn!("no redis_url configured, routing state will not survive restarts");
            Ok(Arc::new(MemoryRoutingStore::with_history_size(
                config.store.latency_history_size,
            )))
        }
    }
}
