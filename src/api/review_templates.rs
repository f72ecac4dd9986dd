use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{
    auth::{get_authenticated_user, AuthenticatedUser},
    session::AppState,
};
use crate::error::{AppError, Result};
use crate::models::{
    review_template::{CreateTemplateData, UpdateTemplateData},
    Channel, ReviewTemplate, User,
};
use crate::services::message_renderer::{self, TemplateVars};

const SMS_MAX_LENGTH: usize = 1600;

#[derive(Debug, Deserialize)]
pub struct ListTemplatesQuery {
    #[serde(rename = "type")]
    pub kind: Option<Channel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateBody {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Channel,
    pub subject: Option<String>,
    pub content: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTemplateBody {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub content: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PreviewBody {
    #[serde(default)]
    pub variables: TemplateVars,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub subject: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub unresolved: Vec<String>,
}

fn validate_content(kind: Channel, content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(AppError::Validation("content is required".to_string()));
    }
    if kind == Channel::Sms && content.chars().count() > SMS_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "SMS content must be at most {} characters",
            SMS_MAX_LENGTH
        )));
    }
    Ok(())
}

async fn load_owned(
    state: &AppState,
    user: &AuthenticatedUser,
    id: Uuid,
) -> Result<ReviewTemplate> {
    let template = ReviewTemplate::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Template".to_string()))?;
    user.ensure_owns(template.owner_id)?;

    Ok(template)
}

async fn list_templates(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ListTemplatesQuery>,
) -> Result<Json<Vec<ReviewTemplate>>> {
    let user = get_authenticated_user(&session).await?;
    let templates = ReviewTemplate::list_by_owner(&state.pool, user.user_id, query.kind).await?;

    Ok(Json(templates))
}

async fn create_template(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CreateTemplateBody>,
) -> Result<(StatusCode, Json<ReviewTemplate>)> {
    let user = get_authenticated_user(&session).await?;

    if body.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    validate_content(body.kind, &body.content)?;

    let template = ReviewTemplate::create(
        &state.pool,
        CreateTemplateData {
            owner_id: user.user_id,
            name: body.name.trim().to_string(),
            kind: body.kind,
            subject: body.subject.filter(|s| !s.trim().is_empty()),
            content: body.content,
            is_default: body.is_default,
        },
    )
    .await?;

    tracing::info!(
        template_id = %template.id,
        template_type = %template.kind,
        is_default = template.is_default,
        "Created review template"
    );

    Ok((StatusCode::CREATED, Json(template)))
}

async fn get_template(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<ReviewTemplate>> {
    let user = get_authenticated_user(&session).await?;
    Ok(Json(load_owned(&state, &user, id).await?))
}

async fn update_template(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTemplateBody>,
) -> Result<Json<ReviewTemplate>> {
    let user = get_authenticated_user(&session).await?;
    let current = load_owned(&state, &user, id).await?;

    if let Some(content) = body.content.as_deref() {
        validate_content(current.kind, content)?;
    }

    let template = ReviewTemplate::update(
        &state.pool,
        id,
        UpdateTemplateData {
            name: body.name.filter(|s| !s.trim().is_empty()),
            subject: body.subject,
            content: body.content,
            is_default: body.is_default,
        },
    )
    .await?
    .ok_or_else(|| AppError::NotFound("Template".to_string()))?;

    tracing::info!(template_id = %id, is_default = template.is_default, "Updated review template");

    Ok(Json(template))
}

async fn delete_template(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let user = get_authenticated_user(&session).await?;
    load_owned(&state, &user, id).await?;
    ReviewTemplate::delete(&state.pool, id).await?;

    tracing::info!(template_id = %id, "Deleted review template");

    Ok(StatusCode::NO_CONTENT)
}

/// Render a template with sample values, overridable by the caller
async fn preview_template(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    body: Option<Json<PreviewBody>>,
) -> Result<Json<PreviewResponse>> {
    let user = get_authenticated_user(&session).await?;
    let template = load_owned(&state, &user, id).await?;

    let owner = User::find_by_id(&state.pool, user.user_id).await?;
    let business_name = owner
        .as_ref()
        .map(|o| o.display_business_name())
        .unwrap_or("Your Business");

    let mut vars = message_renderer::standard_vars(
        "Jane Doe",
        business_name,
        "https://search.google.com/local/writereview?placeid=example",
        None,
    );
    vars.extend(body.map(|Json(b)| b.variables).unwrap_or_default());

    Ok(Json(preview(&template, &vars)))
}

fn preview(template: &ReviewTemplate, vars: &TemplateVars) -> PreviewResponse {
    let content = message_renderer::render(&template.content, vars);
    let mut unresolved = message_renderer::unresolved_placeholders(&template.content, vars);

    let (subject, text) = match template.kind {
        Channel::Email => {
            let subject = template
                .subject
                .as_deref()
                .unwrap_or(message_renderer::DEFAULT_EMAIL_SUBJECT);
            for name in message_renderer::unresolved_placeholders(subject, vars) {
                if !unresolved.contains(&name) {
                    unresolved.push(name);
                }
            }
            (
                Some(message_renderer::render(subject, vars)),
                Some(message_renderer::strip_tags(&content)),
            )
        }
        Channel::Sms => (None, None),
    };

    PreviewResponse {
        subject,
        content,
        text,
        unresolved,
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/review-templates",
            get(list_templates).post(create_template),
        )
        .route(
            "/api/review-templates/:id",
            get(get_template)
                .put(update_template)
                .delete(delete_template),
        )
        .route("/api/review-templates/:id/preview", post(preview_template))
}
