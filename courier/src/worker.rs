//! Queue consumer driving the router.
//!
//! One worker drains the in-process queue and routes each message. Delivery
//! failures are logged and the message dropped; a poison message must never
//! take the consumer down with it.

use std::sync::Arc;

use courier_common::{EmailRequest, Signal};
use courier_routing::Router;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};

pub async fn run(
    router: Arc<Router>,
    mut queue: mpsc::Receiver<EmailRequest>,
    mut shutdown: broadcast::Receiver<Signal>,
) {
    info!("delivery worker started");

    loop {
        tokio::select! {
            message = queue.recv() => match message {
                Some(request) => deliver(&router, request).await,
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }

    info!("delivery worker stopped");
}

async fn deliver(router: &Router, request: EmailRequest) {
    match router.send(&request).await {
        Ok(provider) => {
            info!(provider = %provider, to = %request.to, "queued email delivered");
        }
        Err(routing_error) => {
            error!(to = %request.to, error = %routing_error, "queued email failed");
        }
    }
}
