use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::api::middleware::session::AppState;
use crate::error::{AppError, Result};
use crate::models::WebhookEvent;
use crate::services::webhook_verifier::{self, Platform};

#[derive(Debug, Deserialize)]
pub struct SubscriptionQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Verifies and stores an inbound platform payload
async fn receive(
    state: &AppState,
    platform: Platform,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response> {
    let Some(secret) = state.config.webhooks.secret_for(platform) else {
        tracing::warn!(platform = platform.as_str(), "Webhook secret not configured, rejecting");
        return Err(AppError::Unauthorized);
    };

    let signature = headers
        .get(platform.signature_header())
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !webhook_verifier::verify(secret.expose_secret().as_bytes(), body, signature) {
        tracing::warn!(platform = platform.as_str(), "Invalid webhook signature");
        return Err(AppError::Unauthorized);
    }

    let payload: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid JSON payload: {}", e)))?;

    let event = WebhookEvent::record(&state.pool, platform.as_str(), payload).await?;

    tracing::info!(
        platform = platform.as_str(),
        event_id = %event.id,
        "Webhook received"
    );

    Ok((StatusCode::OK, Json(json!({ "received": true }))).into_response())
}

async fn platform_webhook(
    State(state): State<AppState>,
    Path(platform): Path<Platform>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    receive(&state, platform, &headers, &body).await
}

async fn facebook_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    receive(&state, Platform::Facebook, &headers, &body).await
}

/// Facebook subscription handshake: echo the challenge when the token matches
async fn facebook_subscribe(
    State(state): State<AppState>,
    Query(query): Query<SubscriptionQuery>,
) -> Response {
    let expected = state.config.webhooks.facebook_verify_token.as_ref();

    let token_matches = match (expected, query.verify_token.as_deref()) {
        (Some(expected), Some(provided)) => bool::from(
            provided
                .as_bytes()
                .ct_eq(expected.expose_secret().as_bytes()),
        ),
        _ => false,
    };

    match (query.mode.as_deref(), query.challenge) {
        (Some("subscribe"), Some(challenge)) if token_matches => {
            tracing::info!("Facebook webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        }
        _ => {
            tracing::warn!("Facebook webhook subscription rejected");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/webhooks/facebook",
            get(facebook_subscribe).post(facebook_webhook),
        )
        .route("/api/webhooks/:platform", post(platform_webhook))
}
