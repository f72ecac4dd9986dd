use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub google_place_id: Option<String>,
    pub yelp_business_id: Option<String>,
    pub facebook_page_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateLocationData {
    pub owner_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub google_place_id: Option<String>,
    pub yelp_business_id: Option<String>,
    pub facebook_page_id: Option<String>,
}

impl Location {
    pub async fn create(pool: &PgPool, data: CreateLocationData) -> Result<Self, sqlx::Error> {
        let location = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO locations (
                owner_id, name, address, google_place_id, yelp_business_id, facebook_page_id
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(data.owner_id)
        .bind(&data.name)
        .bind(&data.address)
        .bind(&data.google_place_id)
        .bind(&data.yelp_business_id)
        .bind(&data.facebook_page_id)
        .fetch_one(pool)
        .await?;

        Ok(location)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let location = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM locations WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(location)
    }

    /// Lists an owner's locations, alphabetically
    pub async fn list_by_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let locations = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM locations
            WHERE owner_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

        Ok(locations)
    }
}
