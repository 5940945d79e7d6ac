//! The outbound email request model.

use serde::{Deserialize, Serialize};

/// A single outbound email, as accepted by the ingress and routed by the
/// delivery router.
///
/// `body` is treated as HTML by both provider adapters. When `from_email` is
/// absent, adapters fall back to the configured default sender address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRequest {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Message body (HTML).
    pub body: String,
    /// Optional explicit sender address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_email: Option<String>,
}

impl EmailRequest {
    /// The sender address to use, falling back to `default_from` when the
    /// request did not carry one.
    #[must_use]
    pub fn from_or<'a>(&'a self, default_from: &'a str) -> &'a str {
        self.from_email.as_deref().unwrap_or(default_from)
    }
}
