use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::{http_client, DeliveryAdapter, DeliveryError, DeliveryReceipt, OutboundMessage};
use crate::models::Channel;

const PROVIDER: &str = "twilio";

#[derive(Debug, Clone, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<Secret<String>>,
    pub from_number: Option<String>,
    pub api_base: String,
}

impl TwilioConfig {
    pub const DEFAULT_API_BASE: &'static str = "https://api.twilio.com";
}

/// SMS delivery through the Twilio Messages REST API
pub struct TwilioAdapter {
    config: TwilioConfig,
    client: reqwest::Client,
}

impl TwilioAdapter {
    pub fn new(config: TwilioConfig, timeout_secs: u64) -> Self {
        Self {
            config,
            client: http_client(timeout_secs),
        }
    }

    async fn post(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, DeliveryError> {
        let not_configured = |missing| DeliveryError::NotConfigured {
            provider: PROVIDER,
            missing,
        };

        let account_sid = self
            .config
            .account_sid
            .as_deref()
            .ok_or_else(|| not_configured("TWILIO_ACCOUNT_SID"))?;
        let auth_token = self
            .config
            .auth_token
            .as_ref()
            .ok_or_else(|| not_configured("TWILIO_AUTH_TOKEN"))?;
        let from_number = self
            .config
            .from_number
            .as_deref()
            .ok_or_else(|| not_configured("TWILIO_FROM_NUMBER"))?;

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            account_sid
        );

        let form = [
            ("To", message.to.as_str()),
            ("From", from_number),
            ("Body", message.body.as_str()),
        ];

        tracing::debug!(to = %message.to, "Sending SMS via Twilio");

        let response = self
            .client
            .post(&url)
            .basic_auth(account_sid, Some(auth_token.expose_secret()))
            .form(&form)
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

        // Twilio answers with the created message resource
        let body: JsonValue = response.json().await.unwrap_or(JsonValue::Null);
        let sid = body.get("sid").and_then(JsonValue::as_str).map(str::to_string);

        Ok(DeliveryReceipt {
            provider: PROVIDER,
            channel: Channel::Sms,
            provider_message_id: sid,
            status_code: status.as_u16(),
            response: Some(body),
        })
    }
}

#[async_trait]
impl DeliveryAdapter for TwilioAdapter {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, DeliveryError> {
        let result = self.post(message).await;

        match &result {
            Ok(receipt) => tracing::info!(
                to = %message.to,
                message_sid = ?receipt.provider_message_id,
                "SMS accepted by Twilio"
            ),
            Err(e) => tracing::error!(to = %message.to, error = %e, "SMS delivery failed"),
        }

        result
    }
}
