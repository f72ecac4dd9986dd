use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::get_authenticated_user, session::AppState};
use crate::error::{AppError, Result};
use crate::models::{
    review_request::CreateReviewRequestData, Location, ReviewRequest, ReviewStatus,
    ReviewTemplate,
};
use crate::services::dispatcher::DispatchOutcome;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListRequestsQuery {
    pub limit: Option<i64>,
    pub status: Option<ReviewStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequestBody {
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub location_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// List the caller's review requests
async fn list_requests(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ListRequestsQuery>,
) -> Result<Json<Vec<ReviewRequest>>> {
    let user = get_authenticated_user(&session).await?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let requests =
        ReviewRequest::list_by_owner(&state.pool, user.user_id, query.status, limit).await?;

    Ok(Json(requests))
}

/// Create a pending review request
async fn create_request(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CreateReviewRequestBody>,
) -> Result<(StatusCode, Json<ReviewRequest>)> {
    let user = get_authenticated_user(&session).await?;

    let customer_name = body.customer_name.trim().to_string();
    if customer_name.is_empty() {
        return Err(AppError::Validation("customerName is required".to_string()));
    }

    let customer_email = blank_to_none(body.customer_email);
    if customer_email.as_deref().is_some_and(|e| !e.contains('@')) {
        return Err(AppError::Validation(
            "customerEmail is not a valid email address".to_string(),
        ));
    }

    if let Some(location_id) = body.location_id {
        let location = Location::find_by_id(&state.pool, location_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Location".to_string()))?;
        user.ensure_owns(location.owner_id)?;
    }

    if let Some(template_id) = body.template_id {
        let template = ReviewTemplate::find_by_id(&state.pool, template_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Template".to_string()))?;
        user.ensure_owns(template.owner_id)?;
    }

    let request = ReviewRequest::create(
        &state.pool,
        CreateReviewRequestData {
            owner_id: user.user_id,
            location_id: body.location_id,
            customer_name,
            customer_email,
            customer_phone: blank_to_none(body.customer_phone),
            template_id: body.template_id,
        },
    )
    .await?;

    tracing::info!(request_id = %request.id, "Created review request");

    Ok((StatusCode::CREATED, Json(request)))
}

async fn load_owned(state: &AppState, session: &Session, id: Uuid) -> Result<ReviewRequest> {
    let user = get_authenticated_user(session).await?;
    let request = ReviewRequest::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Review request".to_string()))?;
    user.ensure_owns(request.owner_id)?;

    Ok(request)
}

async fn get_request(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<ReviewRequest>> {
    Ok(Json(load_owned(&state, &session, id).await?))
}

async fn delete_request(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let request = load_owned(&state, &session, id).await?;
    ReviewRequest::delete(&state.pool, request.id).await?;

    tracing::info!(request_id = %id, "Deleted review request");

    Ok(StatusCode::NO_CONTENT)
}

/// Send a review request now
async fn send_request(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    load_owned(&state, &session, id).await?;

    let outcome = state.dispatcher.dispatch(id).await?;

    Ok(dispatch_response(outcome))
}

/// 200 with the receipt, or 500 carrying the request now marked failed
pub(crate) fn dispatch_response(outcome: DispatchOutcome) -> Response {
    let response = match outcome.result {
        Ok(receipt) => (
            StatusCode::OK,
            Json(json!({
                "message": "Review request sent successfully",
                "request": outcome.request,
                "result": receipt,
            })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "message": "Failed to send review request",
                "request": outcome.request,
                "error": e.to_string(),
            })),
        ),
    };

    response.into_response()
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/review-requests",
            get(list_requests).post(create_request),
        )
        .route(
            "/api/review-requests/:id",
            get(get_request).delete(delete_request),
        )
        .route("/api/review-requests/:id/send", post(send_request))
}
