//! SendGrid delivery adapter.
//!
//! Sends through the v3 mail send endpoint, which acknowledges accepted
//! messages with `202 Accepted` and an empty body.

use std::time::Duration;

use async_trait::async_trait;
use courier_common::EmailRequest;
use courier_routing::{Provider, ProviderId, SendError};
use serde_json::{json, Value};
use tracing::debug;

const MAIL_SEND_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers email through the SendGrid v3 API.
pub struct SendGridProvider {
    http: reqwest::Client,
    api_key: String,
    default_from: String,
    endpoint: String,
}

impl SendGridProvider {
    /// Create an adapter authenticating with `api_key` and falling back to
    /// `default_from` when a request carries no sender.
    pub fn new(api_key: String, default_from: String) -> Result<Self, SendError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| SendError::Configuration(error.to_string()))?;

        Ok(Self {
            http,
            api_key,
            default_from,
            endpoint: MAIL_SEND_ENDPOINT.to_string(),
        })
    }

    /// Point the adapter at a different endpoint. Used by tests against a
    /// local server.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn payload(&self, request: &EmailRequest) -> Value {
        json!({
            "personalizations": [{ "to": [{ "email": request.to }] }],
            "from": { "email": request.from_or(&self.default_from) },
            "subject": request.subject,
            "content": [{ "type": "text/html", "value": request.body }],
        })
    }
}

#[async_trait]
impl Provider for SendGridProvider {
    fn id(&self) -> ProviderId {
        ProviderId::SendGrid
    }

    async fn send(&self, request: &EmailRequest) -> Result<(), SendError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.payload(request))
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    SendError::Timeout(REQUEST_TIMEOUT)
                } else {
                    SendError::Transport(error.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SendError::Rejected {
                status: status.as_u16(),
            });
        }

        debug!(to = %request.to, status = status.as_u16(), "sendgrid accepted message");
        Ok(())
    }
}

impl std::fmt::Debug for SendGridProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendGridProvider")
            .field("endpoint", &self.endpoint)
            .field("default_from", &self.default_from)
            .finish_non_exhaustive()
    }
}
