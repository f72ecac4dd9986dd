use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A standing rule that turns CRM events into review requests
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CrmIntegration {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub crm_type: String, // e.g. "hubspot", "salesforce", "custom"
    #[serde(skip_serializing)]
    pub api_key: String,
    pub trigger_event: String,
    pub template_id: Option<Uuid>,
    pub delay_hours: i32,
    pub active: bool,
    pub custom_endpoint: Option<String>,
    pub last_sync: Option<DateTime<Utc>>,
    pub requests_sent: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateIntegrationData {
    pub owner_id: Uuid,
    pub crm_type: String,
    pub api_key: String,
    pub trigger_event: String,
    pub template_id: Option<Uuid>,
    pub delay_hours: i32,
    pub custom_endpoint: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateIntegrationData {
    pub crm_type: Option<String>,
    pub api_key: Option<String>,
    pub trigger_event: Option<String>,
    pub template_id: Option<Uuid>,
    pub delay_hours: Option<i32>,
    pub custom_endpoint: Option<String>,
}

impl CrmIntegration {
    pub async fn create(pool: &PgPool, data: CreateIntegrationData) -> Result<Self, sqlx::Error> {
        let integration = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO crm_integrations (
                owner_id, crm_type, api_key, trigger_event, template_id, delay_hours, custom_endpoint
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(data.owner_id)
        .bind(&data.crm_type)
        .bind(&data.api_key)
        .bind(&data.trigger_event)
        .bind(data.template_id)
        .bind(data.delay_hours)
        .bind(&data.custom_endpoint)
        .fetch_one(pool)
        .await?;

        Ok(integration)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let integration = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM crm_integrations WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(integration)
    }

    pub async fn list_by_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let integrations = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM crm_integrations
            WHERE owner_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

        Ok(integrations)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateIntegrationData,
    ) -> Result<Option<Self>, sqlx::Error> {
        let integration = sqlx::query_as::<_, Self>(
            r#"
            UPDATE crm_integrations
            SET
                crm_type = COALESCE($2, crm_type),
                api_key = COALESCE($3, api_key),
                trigger_event = COALESCE($4, trigger_event),
                template_id = COALESCE($5, template_id),
                delay_hours = COALESCE($6, delay_hours),
                custom_endpoint = COALESCE($7, custom_endpoint),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.crm_type)
        .bind(data.api_key)
        .bind(data.trigger_event)
        .bind(data.template_id)
        .bind(data.delay_hours)
        .bind(data.custom_endpoint)
        .fetch_optional(pool)
        .await?;

        Ok(integration)
    }

    pub async fn set_active(pool: &PgPool, id: Uuid, active: bool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE crm_integrations
            SET active = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(active)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Counts one successful automated send
    pub async fn record_send(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE crm_integrations
            SET requests_sent = requests_sent + 1, last_sync = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM crm_integrations WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
