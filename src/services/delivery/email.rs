use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

use super::{http_client, DeliveryAdapter, DeliveryError, DeliveryReceipt, OutboundMessage};
use crate::models::Channel;

const PROVIDER: &str = "sendgrid";

#[derive(Debug, Clone, Deserialize)]
pub struct SendGridConfig {
    pub api_key: Option<Secret<String>>,
    pub from_email: String,
    pub from_name: Option<String>,
    pub api_base: String,
}

impl SendGridConfig {
    pub const DEFAULT_API_BASE: &'static str = "https://api.sendgrid.com";
}

/// Email delivery through the SendGrid v3 mail-send API
pub struct SendGridAdapter {
    config: SendGridConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct MailSendRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    mime: &'static str,
    value: &'a str,
}

impl SendGridAdapter {
    pub fn new(config: SendGridConfig, timeout_secs: u64) -> Self {
        Self {
            config,
            client: http_client(timeout_secs),
        }
    }

    async fn post(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, DeliveryError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or(DeliveryError::NotConfigured {
                provider: PROVIDER,
                missing: "SENDGRID_API_KEY",
            })?;

        let subject = message.subject.as_deref().unwrap_or("");
        let mut content = Vec::with_capacity(2);
        if let Some(text) = message.text_body.as_deref() {
            content.push(Content {
                mime: "text/plain",
                value: text,
            });
        }
        content.push(Content {
            mime: "text/html",
            value: &message.body,
        });

        let payload = MailSendRequest {
            personalizations: vec![Personalization {
                to: vec![Address {
                    email: &message.to,
                    name: message.recipient_name.as_deref(),
                }],
            }],
            from: Address {
                email: &self.config.from_email,
                name: self.config.from_name.as_deref(),
            },
            subject,
            content,
        };

        let url = format!("{}/v3/mail/send", self.config.api_base.trim_end_matches('/'));

        tracing::debug!(to = %message.to, subject = %subject, "Sending email via SendGrid");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key.expose_secret())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Provider {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(DeliveryReceipt {
            provider: PROVIDER,
            channel: Channel::Email,
            provider_message_id: message_id,
            status_code: status.as_u16(),
            response: None,
        })
    }
}

#[async_trait]
impl DeliveryAdapter for SendGridAdapter {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, DeliveryError> {
        let result = self.post(message).await;

        match &result {
            Ok(receipt) => tracing::info!(
                to = %message.to,
                message_id = ?receipt.provider_message_id,
                "Email accepted by SendGrid"
            ),
            Err(e) => tracing::error!(to = %message.to, error = %e, "Email delivery failed"),
        }

        result
    }
}
