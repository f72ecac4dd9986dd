use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use subtle::ConstantTimeEq;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{
    auth::{get_authenticated_user, AuthenticatedUser},
    session::AppState,
};
use crate::api::review_requests::dispatch_response;
use crate::error::{AppError, Result};
use crate::models::{
    crm_integration::{CreateIntegrationData, CrmIntegration, UpdateIntegrationData},
    ReviewTemplate,
};
use crate::services::crm_automation::{self, CrmEvent, TriggerOutcome};

const API_KEY_HEADER: &str = "x-api-key";
const MAX_DELAY_HOURS: i32 = 24 * 30;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntegrationBody {
    pub crm_type: String,
    pub api_key: String,
    pub trigger_event: String,
    pub template_id: Option<Uuid>,
    #[serde(default)]
    pub delay_hours: i32,
    pub custom_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIntegrationBody {
    pub crm_type: Option<String>,
    pub api_key: Option<String>,
    pub trigger_event: Option<String>,
    pub template_id: Option<Uuid>,
    pub delay_hours: Option<i32>,
    pub custom_endpoint: Option<String>,
}

fn validate_delay(delay_hours: i32) -> Result<()> {
    if !(0..=MAX_DELAY_HOURS).contains(&delay_hours) {
        return Err(AppError::Validation(format!(
            "delayHours must be between 0 and {}",
            MAX_DELAY_HOURS
        )));
    }
    Ok(())
}

fn validate_endpoint(endpoint: Option<&str>) -> Result<()> {
    if let Some(endpoint) = endpoint {
        let valid = url::Url::parse(endpoint)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !valid {
            return Err(AppError::Validation(
                "customEndpoint must be an http(s) URL".to_string(),
            ));
        }
    }
    Ok(())
}

async fn ensure_template_owned(
    state: &AppState,
    user: &AuthenticatedUser,
    template_id: Option<Uuid>,
) -> Result<()> {
    if let Some(template_id) = template_id {
        let template = ReviewTemplate::find_by_id(&state.pool, template_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Template".to_string()))?;
        user.ensure_owns(template.owner_id)?;
    }
    Ok(())
}

async fn load_owned(
    state: &AppState,
    user: &AuthenticatedUser,
    id: Uuid,
) -> Result<CrmIntegration> {
    let integration = CrmIntegration::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("CRM integration".to_string()))?;
    user.ensure_owns(integration.owner_id)?;

    Ok(integration)
}

async fn list_integrations(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<CrmIntegration>>> {
    let user = get_authenticated_user(&session).await?;
    let integrations = CrmIntegration::list_by_owner(&state.pool, user.user_id).await?;

    Ok(Json(integrations))
}

async fn create_integration(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CreateIntegrationBody>,
) -> Result<(StatusCode, Json<CrmIntegration>)> {
    let user = get_authenticated_user(&session).await?;

    if body.crm_type.trim().is_empty() || body.trigger_event.trim().is_empty() {
        return Err(AppError::Validation(
            "crmType and triggerEvent are required".to_string(),
        ));
    }
    if body.api_key.trim().is_empty() {
        return Err(AppError::Validation("apiKey is required".to_string()));
    }
    validate_delay(body.delay_hours)?;
    validate_endpoint(body.custom_endpoint.as_deref())?;
    ensure_template_owned(&state, &user, body.template_id).await?;

    let integration = CrmIntegration::create(
        &state.pool,
        CreateIntegrationData {
            owner_id: user.user_id,
            crm_type: body.crm_type.trim().to_lowercase(),
            api_key: body.api_key.trim().to_string(),
            trigger_event: body.trigger_event.trim().to_string(),
            template_id: body.template_id,
            delay_hours: body.delay_hours,
            custom_endpoint: body.custom_endpoint,
        },
    )
    .await?;

    tracing::info!(
        integration_id = %integration.id,
        crm_type = %integration.crm_type,
        "Created CRM integration"
    );

    Ok((StatusCode::CREATED, Json(integration)))
}

async fn get_integration(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<CrmIntegration>> {
    let user = get_authenticated_user(&session).await?;
    Ok(Json(load_owned(&state, &user, id).await?))
}

async fn update_integration(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateIntegrationBody>,
) -> Result<Json<CrmIntegration>> {
    let user = get_authenticated_user(&session).await?;
    load_owned(&state, &user, id).await?;

    if let Some(delay_hours) = body.delay_hours {
        validate_delay(delay_hours)?;
    }
    validate_endpoint(body.custom_endpoint.as_deref())?;
    ensure_template_owned(&state, &user, body.template_id).await?;

    let not_blank = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    let integration = CrmIntegration::update(
        &state.pool,
        id,
        UpdateIntegrationData {
            crm_type: not_blank(body.crm_type).map(|s| s.to_lowercase()),
            api_key: not_blank(body.api_key),
            trigger_event: not_blank(body.trigger_event),
            template_id: body.template_id,
            delay_hours: body.delay_hours,
            custom_endpoint: body.custom_endpoint,
        },
    )
    .await?
    .ok_or_else(|| AppError::NotFound("CRM integration".to_string()))?;

    tracing::info!(integration_id = %id, "Updated CRM integration");

    Ok(Json(integration))
}

async fn delete_integration(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let user = get_authenticated_user(&session).await?;
    load_owned(&state, &user, id).await?;
    CrmIntegration::delete(&state.pool, id).await?;

    tracing::info!(integration_id = %id, "Deleted CRM integration");

    Ok(StatusCode::NO_CONTENT)
}

/// Toggle integration active status
async fn toggle_integration(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<CrmIntegration>> {
    let user = get_authenticated_user(&session).await?;
    let integration = load_owned(&state, &user, id).await?;

    let active = !integration.active;
    CrmIntegration::set_active(&state.pool, id, active).await?;

    tracing::info!(integration_id = %id, active, "Toggled CRM integration");

    Ok(Json(CrmIntegration {
        active,
        ..integration
    }))
}

/// Send a one-off request through the integration's pipeline
async fn test_integration(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(event): Json<CrmEvent>,
) -> Result<Response> {
    let user = get_authenticated_user(&session).await?;
    let integration = load_owned(&state, &user, id).await?;

    let outcome = crm_automation::test_trigger(&state.dispatcher, &integration, event).await?;

    Ok(dispatch_response(outcome))
}

fn api_key_matches(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|provided| bool::from(provided.trim().as_bytes().ct_eq(expected.as_bytes())))
        .unwrap_or(false)
}

/// Inbound CRM event, authenticated by the integration's API key
async fn receive_crm_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(event): Json<CrmEvent>,
) -> Result<Response> {
    // Unknown id and bad key answer the same way
    let integration = CrmIntegration::find_by_id(&state.pool, id)
        .await?
        .filter(|i| api_key_matches(&headers, &i.api_key))
        .ok_or(AppError::Unauthorized)?;

    tracing::info!(
        integration_id = %integration.id,
        event = %event.event,
        "Received CRM event"
    );

    let response = match crm_automation::trigger(&state.dispatcher, &integration, event).await? {
        TriggerOutcome::Skipped(reason) => (
            StatusCode::OK,
            Json(json!({ "message": "Event ignored", "skipped": reason })),
        )
            .into_response(),
        TriggerOutcome::Queued(request) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "message": format!(
                    "Review request created; send after {} hours",
                    integration.delay_hours
                ),
                "request": request,
            })),
        )
            .into_response(),
        TriggerOutcome::Dispatched(outcome) => dispatch_response(outcome),
    };

    Ok(response)
}

/// Session-authenticated management routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/crm-integrations",
            get(list_integrations).post(create_integration),
        )
        .route(
            "/api/crm-integrations/:id",
            get(get_integration)
                .put(update_integration)
                .delete(delete_integration),
        )
        .route("/api/crm-integrations/:id/toggle", post(toggle_integration))
        .route("/api/crm-integrations/:id/test", post(test_integration))
}

/// Routes called by CRMs themselves
pub fn hooks_router() -> Router<AppState> {
    Router::new().route("/api/crm/hooks/:id", post(receive_crm_event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_api_key_comparison() {
        let mut headers = HeaderMap::new();
        assert!(!api_key_matches(&headers, "secret-key"));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret-key"));
        assert!(api_key_matches(&headers, "secret-key"));
        assert!(!api_key_matches(&headers, "secret-kez"));
        assert!(!api_key_matches(&headers, "secret-key-longer"));
    }

    #[test]
    fn test_delay_bounds() {
        assert!(validate_delay(0).is_ok());
        assert!(validate_delay(MAX_DELAY_HOURS).is_ok());
        assert!(validate_delay(-1).is_err());
        assert!(validate_delay(MAX_DELAY_HOURS + 1).is_err());
    }

    #[test]
    fn test_custom_endpoint_must_be_http() {
        assert!(validate_endpoint(None).is_ok());
        assert!(validate_endpoint(Some("https://crm.example.com/hook")).is_ok());
        assert!(validate_endpoint(Some("ftp://crm.example.com")).is_err());
        assert!(validate_endpoint(Some("not a url")).is_err());
    }
}
