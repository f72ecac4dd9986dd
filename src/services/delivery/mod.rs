//! Delivery adapters: thin wrappers that turn a rendered message into one
//! provider API call.
//!
//! Every adapter makes a single attempt. Failures are logged at the adapter
//! boundary and returned as a [`DeliveryError`]; the caller decides what the
//! failure means for the review request.

pub mod email;
pub mod sms;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::models::Channel;

pub use email::SendGridAdapter;
pub use sms::TwilioAdapter;

#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    #[error("{provider} is not configured: missing {missing}")]
    NotConfigured {
        provider: &'static str,
        missing: &'static str,
    },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("{provider} rejected the message (HTTP {status}): {body}")]
    Provider {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("No delivery adapter for channel {0}")]
    UnsupportedChannel(Channel),
}

/// A fully rendered message ready for a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel: Channel,
    pub to: String,
    pub recipient_name: Option<String>,
    /// Email only
    pub subject: Option<String>,
    /// HTML for email, plain text for SMS
    pub body: String,
    /// Plain-text alternative, email only
    pub text_body: Option<String>,
}

/// Provider acknowledgement of an accepted message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub provider: &'static str,
    pub channel: Channel,
    pub provider_message_id: Option<String>,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<JsonValue>,
}

#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, DeliveryError>;
}

/// The adapter set available to the dispatcher, one per channel
#[derive(Clone)]
pub struct DeliveryAdapters {
    email: Arc<dyn DeliveryAdapter>,
    sms: Arc<dyn DeliveryAdapter>,
}

impl DeliveryAdapters {
    pub fn new(email: Arc<dyn DeliveryAdapter>, sms: Arc<dyn DeliveryAdapter>) -> Self {
        Self { email, sms }
    }

    pub fn for_channel(&self, channel: Channel) -> &Arc<dyn DeliveryAdapter> {
        match channel {
            Channel::Email => &self.email,
            Channel::Sms => &self.sms,
        }
    }

    /// Routes a message to the adapter for its channel
    pub async fn deliver(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, DeliveryError> {
        let adapter = self.for_channel(message.channel);
        if adapter.channel() != message.channel {
            return Err(DeliveryError::UnsupportedChannel(message.channel));
        }
        adapter.send(message).await
    }
}

pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}
