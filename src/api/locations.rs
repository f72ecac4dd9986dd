use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::get_authenticated_user, session::AppState};
use crate::error::{AppError, Result};
use crate::models::{location::CreateLocationData, Location};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLocationBody {
    pub name: String,
    pub address: Option<String>,
    pub google_place_id: Option<String>,
    pub yelp_business_id: Option<String>,
    pub facebook_page_id: Option<String>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn list_locations(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<Location>>> {
    let user = get_authenticated_user(&session).await?;
    let locations = Location::list_by_owner(&state.pool, user.user_id).await?;

    Ok(Json(locations))
}

async fn create_location(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CreateLocationBody>,
) -> Result<(StatusCode, Json<Location>)> {
    let user = get_authenticated_user(&session).await?;

    if body.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }

    let location = Location::create(
        &state.pool,
        CreateLocationData {
            owner_id: user.user_id,
            name: body.name.trim().to_string(),
            address: trimmed(body.address),
            google_place_id: trimmed(body.google_place_id),
            yelp_business_id: trimmed(body.yelp_business_id),
            facebook_page_id: trimmed(body.facebook_page_id),
        },
    )
    .await?;

    tracing::info!(location_id = %location.id, "Created location");

    Ok((StatusCode::CREATED, Json(location)))
}

async fn get_location(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Location>> {
    let user = get_authenticated_user(&session).await?;
    let location = Location::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Location".to_string()))?;
    user.ensure_owns(location.owner_id)?;

    Ok(Json(location))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/locations", get(list_locations).post(create_location))
        .route("/api/locations/:id", get(get_location))
}
