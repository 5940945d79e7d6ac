//! HTTP ingress for send requests.
//!
//! `POST /send-email` validates the request body and hands it to the
//! delivery worker over the bounded in-process queue; delivery happens
//! asynchronously. `GET /` answers liveness probes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use courier_common::{EmailRequest, Signal};
use serde_json::json;
use tokio::{
    net::TcpListener,
    sync::{broadcast, mpsc},
};
use tracing::{info, warn};

#[derive(Clone)]
struct AppState {
    queue: mpsc::Sender<EmailRequest>,
}

/// The ingress server, bound and ready to serve.
pub struct HttpServer {
    listener: TcpListener,
    router: Router,
}

impl HttpServer {
    /// Bind the listener and build the route table.
    pub async fn bind(
        listen_address: &str,
        queue: mpsc::Sender<EmailRequest>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(listen_address)
            .await
            .map_err(|error| anyhow::anyhow!("failed to bind {listen_address}: {error}"))?;

        info!(address = %listen_address, "ingress server bound");

        let router = Router::new()
            .route("/", get(health_handler))
            .route("/send-email", post(enqueue_handler))
            .with_state(AppState { queue });

        Ok(Self { listener, router })
    }

    /// Serve until a shutdown signal arrives.
    pub async fn serve(
        self,
        mut shutdown: broadcast::Receiver<Signal>,
    ) -> anyhow::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                info!("ingress server received shutdown signal");
            })
            .await?;

        info!("ingress server stopped");
        Ok(())
    }
}

async fn health_handler() -> Response {
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

/// Accepts a send request and queues it for delivery.
///
/// Queueing is the only work done on the request path; a full queue pushes
/// back with 503 rather than blocking the handler.
async fn enqueue_handler(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> Response {
    let to = request.to.clone();
    match state.queue.try_send(request) {
        Ok(()) => {
            info!(to = %to, "email queued for delivery");
            (
                StatusCode::OK,
                Json(json!({ "message": "Email queued successfully" })),
            )
                .into_response()
        }
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!(to = %to, "delivery queue full, rejecting request");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "detail": "delivery queue is full" })),
            )
                .into_response()
        }
        Err(mpsc::error::TrySendError::Closed(_)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "delivery worker unavailable" })),
        )
            .into_response(),
    }
}
