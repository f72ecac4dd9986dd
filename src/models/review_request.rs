use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Minutes after which an unfinished dispatch claim may be taken over
pub const CLAIM_TTL_MINUTES: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Sent,
    Delivered,
    Opened,
    Clicked,
    Completed,
    Failed,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Sent => "sent",
            ReviewStatus::Delivered => "delivered",
            ReviewStatus::Opened => "opened",
            ReviewStatus::Clicked => "clicked",
            ReviewStatus::Completed => "completed",
            ReviewStatus::Failed => "failed",
        }
    }

    /// Statuses a dispatch may start from. Failed requests are re-sent by hand.
    pub const DISPATCHABLE: [ReviewStatus; 2] = [ReviewStatus::Pending, ReviewStatus::Failed];

    pub fn is_dispatchable(&self) -> bool {
        Self::DISPATCHABLE.contains(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub location_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub template_id: Option<Uuid>,
    pub status: ReviewStatus,
    #[serde(skip)]
    pub dispatch_claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateReviewRequestData {
    pub owner_id: Uuid,
    pub location_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub template_id: Option<Uuid>,
}

impl ReviewRequest {
    /// Creates a new request in `pending` status
    pub async fn create(
        pool: &PgPool,
        data: CreateReviewRequestData,
    ) -> Result<Self, sqlx::Error> {
        let request = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO review_requests (
                owner_id, location_id, customer_name, customer_email, customer_phone, template_id
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(data.owner_id)
        .bind(data.location_id)
        .bind(&data.customer_name)
        .bind(&data.customer_email)
        .bind(&data.customer_phone)
        .bind(data.template_id)
        .fetch_one(pool)
        .await?;

        Ok(request)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let request = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM review_requests WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(request)
    }

    /// Lists an owner's requests, newest first
    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: Uuid,
        status: Option<ReviewStatus>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let requests = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM review_requests
            WHERE owner_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(owner_id)
        .bind(status)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(requests)
    }

    /// Reserves a request for one dispatch.
    ///
    /// Succeeds only from a dispatchable status while no other dispatch holds the
    /// claim, so concurrent sends of the same request deliver at most once. A
    /// claim older than `CLAIM_TTL_MINUTES` is treated as abandoned.
    pub async fn claim_for_dispatch(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let request = sqlx::query_as::<_, Self>(
            r#"
            UPDATE review_requests
            SET dispatch_claimed_at = NOW()
            WHERE id = $1
              AND status = ANY($3)
              AND (
                  dispatch_claimed_at IS NULL
                  OR dispatch_claimed_at < NOW() - make_interval(mins => $2)
              )
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(CLAIM_TTL_MINUTES)
        .bind(ReviewStatus::DISPATCHABLE.map(|s| s.as_str()).to_vec())
        .fetch_optional(pool)
        .await?;

        Ok(request)
    }

    /// Records the single outcome of a dispatch and releases the claim
    pub async fn finish_dispatch(
        pool: &PgPool,
        id: Uuid,
        status: ReviewStatus,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<Self, sqlx::Error> {
        let request = sqlx::query_as::<_, Self>(
            r#"
            UPDATE review_requests
            SET status = $2, sent_at = COALESCE($3, sent_at), dispatch_claimed_at = NULL
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(sent_at)
        .fetch_one(pool)
        .await?;

        Ok(request)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM review_requests WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_and_failed_are_dispatchable() {
        assert_eq!(
            ReviewStatus::DISPATCHABLE.map(|s| s.as_str()),
            ["pending", "failed"]
        );
        assert!(ReviewStatus::Pending.is_dispatchable());
        assert!(ReviewStatus::Failed.is_dispatchable());
        assert!(!ReviewStatus::Sent.is_dispatchable());
        assert!(!ReviewStatus::Opened.is_dispatchable());
        assert!(!ReviewStatus::Completed.is_dispatchable());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&ReviewStatus::Clicked).unwrap();
        assert_eq!(json, "\"clicked\"");

        let parsed: ReviewStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, ReviewStatus::Failed);
    }
}
