use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A verified inbound payload from a review platform, kept for review ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub id: Uuid,
    pub platform: String,
    pub payload: JsonValue, // JSONB field
    pub received_at: DateTime<Utc>,
}

impl WebhookEvent {
    pub async fn record(
        pool: &PgPool,
        platform: &str,
        payload: JsonValue,
    ) -> Result<Self, sqlx::Error> {
        let event = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO webhook_events (platform, payload)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(platform)
        .bind(payload)
        .fetch_one(pool)
        .await?;

        Ok(event)
    }
}
