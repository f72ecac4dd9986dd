use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Delivery channel of a template, and of a resolved contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReviewTemplate {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: Channel,
    pub subject: Option<String>,
    pub content: String, // raw text with {{variable}} placeholders
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTemplateData {
    pub owner_id: Uuid,
    pub name: String,
    pub kind: Channel,
    pub subject: Option<String>,
    pub content: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTemplateData {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub content: Option<String>,
    pub is_default: Option<bool>,
}

impl ReviewTemplate {
    /// Creates a template. When it is flagged as default, the previous default
    /// for the same (owner, type) is cleared in the same transaction.
    pub async fn create(pool: &PgPool, data: CreateTemplateData) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if data.is_default {
            clear_default(&mut tx, data.owner_id, data.kind, None).await?;
        }

        let template = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO review_templates (owner_id, name, type, subject, content, is_default)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(data.owner_id)
        .bind(&data.name)
        .bind(data.kind)
        .bind(&data.subject)
        .bind(&data.content)
        .bind(data.is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(template)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let template = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM review_templates WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(template)
    }

    /// Finds the owner's default template for a channel
    pub async fn find_default(
        pool: &PgPool,
        owner_id: Uuid,
        kind: Channel,
    ) -> Result<Option<Self>, sqlx::Error> {
        let template = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM review_templates
            WHERE owner_id = $1 AND type = $2 AND is_default = TRUE
            LIMIT 1
            "#,
        )
        .bind(owner_id)
        .bind(kind)
        .fetch_optional(pool)
        .await?;

        Ok(template)
    }

    /// Lists an owner's templates, optionally narrowed to one channel
    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: Uuid,
        kind: Option<Channel>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let templates = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM review_templates
            WHERE owner_id = $1 AND ($2::TEXT IS NULL OR type = $2)
            ORDER BY is_default DESC, created_at DESC
            "#,
        )
        .bind(owner_id)
        .bind(kind)
        .fetch_all(pool)
        .await?;

        Ok(templates)
    }

    /// Applies a partial update. Promoting the template to default clears the
    /// other default of the same (owner, type) atomically.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateTemplateData,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let current = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM review_templates WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            return Ok(None);
        };

        if data.is_default == Some(true) {
            clear_default(&mut tx, current.owner_id, current.kind, Some(id)).await?;
        }

        let template = sqlx::query_as::<_, Self>(
            r#"
            UPDATE review_templates
            SET
                name = COALESCE($2, name),
                subject = COALESCE($3, subject),
                content = COALESCE($4, content),
                is_default = COALESCE($5, is_default),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(data.subject)
        .bind(data.content)
        .bind(data.is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(template))
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM review_templates WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

async fn clear_default(
    tx: &mut Transaction<'_, Postgres>,
    owner_id: Uuid,
    kind: Channel,
    except: Option<Uuid>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE review_templates
        SET is_default = FALSE, updated_at = NOW()
        WHERE owner_id = $1 AND type = $2 AND is_default = TRUE
          AND ($3::UUID IS NULL OR id <> $3)
        "#,
    )
    .bind(owner_id)
    .bind(kind)
    .bind(except)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
