use secrecy::Secret;
use serde::Deserialize;

use crate::services::delivery::{email::SendGridConfig, sms::TwilioConfig};
use crate::services::webhook_verifier::Platform;

const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub base_url: String,
    pub host: String,
    pub port: u16,

    // SendGrid (email delivery)
    pub sendgrid: SendGridConfig,

    // Twilio (SMS delivery)
    pub twilio: TwilioConfig,

    // Applies to every outbound provider call
    pub provider_timeout_secs: u64,

    // Inbound platform webhooks
    pub webhooks: WebhookSecrets,
}

/// Shared secrets used to verify inbound review-platform webhooks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookSecrets {
    pub facebook_app_secret: Option<Secret<String>>,
    pub facebook_verify_token: Option<Secret<String>>,
    pub yelp_secret: Option<Secret<String>>,
    pub google_secret: Option<Secret<String>>,
    pub apple_secret: Option<Secret<String>>,
}

impl WebhookSecrets {
    pub fn secret_for(&self, platform: Platform) -> Option<&Secret<String>> {
        match platform {
            Platform::Facebook => self.facebook_app_secret.as_ref(),
            Platform::Yelp => self.yelp_secret.as_ref(),
            Platform::Google => self.google_secret.as_ref(),
            Platform::Apple => self.apple_secret.as_ref(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        let secret = |key: &str| config.get::<String>(key).ok().map(Secret::new);

        Ok(Self {
            database_url: config.get("database_url")?,
            base_url: config.get("base_url")?,
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port")?,

            sendgrid: SendGridConfig {
                api_key: secret("sendgrid_api_key"),
                from_email: config
                    .get("sendgrid_from_email")
                    .unwrap_or_else(|_| "reviews@example.com".to_string()),
                from_name: config.get("sendgrid_from_name").ok(),
                api_base: config
                    .get("sendgrid_api_base")
                    .unwrap_or_else(|_| SendGridConfig::DEFAULT_API_BASE.to_string()),
            },

            twilio: TwilioConfig {
                account_sid: config.get("twilio_account_sid").ok(),
                auth_token: secret("twilio_auth_token"),
                from_number: config.get("twilio_from_number").ok(),
                api_base: config
                    .get("twilio_api_base")
                    .unwrap_or_else(|_| TwilioConfig::DEFAULT_API_BASE.to_string()),
            },

            provider_timeout_secs: config
                .get("provider_timeout_secs")
                .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS),

            webhooks: WebhookSecrets {
                facebook_app_secret: secret("facebook_app_secret"),
                facebook_verify_token: secret("facebook_verify_token"),
                yelp_secret: secret("yelp_webhook_secret"),
                google_secret: secret("google_webhook_secret"),
                apple_secret: secret("apple_webhook_secret"),
            },
        })
    }
}
