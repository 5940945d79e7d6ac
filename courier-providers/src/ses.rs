//! Amazon SES delivery adapter.
//!
//! Credentials and region resolve through the standard AWS provider chain;
//! a region from configuration takes precedence when present.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_sesv2::{
    Client,
    config::Region,
    error::SdkError,
    types::{Body, Content, Destination, EmailContent, Message},
};
use courier_common::EmailRequest;
use courier_routing::{Provider, ProviderId, SendError};
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers email through the Amazon SES v2 API.
pub struct SesProvider {
    client: Client,
    default_from: String,
}

impl SesProvider {
    /// Create an adapter from the ambient AWS environment, overriding the
    /// region when one is configured.
    pub async fn from_env(region: Option<String>, default_from: String) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .timeout_config(
                aws_config::timeout::TimeoutConfig::builder()
                    .operation_timeout(REQUEST_TIMEOUT)
                    .build(),
            );
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let config = loader.load().await;

        Self {
            client: Client::new(&config),
            default_from,
        }
    }

    fn email_content(request: &EmailRequest) -> Result<EmailContent, SendError> {
        let subject = Content::builder()
            .data(&request.subject)
            .build()
            .map_err(|error| SendError::Configuration(error.to_string()))?;
        let html = Content::builder()
            .data(&request.body)
            .build()
            .map_err(|error| SendError::Configuration(error.to_string()))?;

        let message = Message::builder()
            .subject(subject)
            .body(Body::builder().html(html).build())
            .build();

        Ok(EmailContent::builder().simple(message).build())
    }
}

#[async_trait]
impl Provider for SesProvider {
    fn id(&self) -> ProviderId {
        ProviderId::AmazonSes
    }

    async fn send(&self, request: &EmailRequest) -> Result<(), SendError> {
        let destination = Destination::builder().to_addresses(&request.to).build();

        self.client
            .send_email()
            .from_email_address(request.from_or(&self.default_from))
            .destination(destination)
            .content(Self::email_content(request)?)
            .send()
            .await
            .map_err(|error| match &error {
                SdkError::TimeoutError(_) => SendError::Timeout(REQUEST_TIMEOUT),
                SdkError::ServiceError(context) => SendError::Rejected {
                    status: context.raw().status().as_u16(),
                },
                _ => SendError::Transport(error.to_string()),
            })?;

        debug!(to = %request.to, "ses accepted message");
        Ok(())
    }
}

impl std::fmt::Debug for SesProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SesProvider")
            .field("default_from", &self.default_from)
            .finish_non_exhaustive()
    }
}
