//! The provider seam the router drives.
//!
//! The delivery set is a static pair of interchangeable providers. Adapters
//! implement [`Provider`] over their own transport; the router only sees a
//! pass/fail outcome and how long the call took.

use std::fmt;

use async_trait::async_trait;
use courier_common::EmailRequest;
use serde::{Deserialize, Serialize};

use crate::error::SendError;

/// Identity of a delivery provider.
///
/// The display names double as field names in the shared state store, so
/// they must stay stable across deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderId {
    /// SendGrid's HTTP mail API.
    SendGrid,
    /// Amazon Simple Email Service.
    AmazonSes,
}

impl ProviderId {
    /// Both known providers, in tie-break preference order.
    pub const ALL: [Self; 2] = [Self::SendGrid, Self::AmazonSes];

    /// Stable name used for store keys and logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SendGrid => "SendGrid",
            Self::AmazonSes => "Amazon SES",
        }
    }

    /// The alternate provider in the two-provider set.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::SendGrid => Self::AmazonSes,
            Self::AmazonSes => Self::SendGrid,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivery provider's send capability.
///
/// Implementations carry their own call timeout: the router relies on the
/// adapter to bound a hung provider rather than imposing one itself.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The identity this adapter delivers through.
    fn id(&self) -> ProviderId;

    /// Transmit one email. Non-success transport outcomes must surface as
    /// a [`SendError`], never as a silent return.
    async fn send(&self, request: &EmailRequest) -> Result<(), SendError>;
}
