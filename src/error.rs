use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::api::middleware::auth::AuthError;
use crate::services::crm_automation::CrmTriggerError;
use crate::services::dispatcher::DispatchError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "You do not have access to this resource".to_string(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Internal(e) => {
                tracing::error!(error = ?e, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let unique_violation = err
            .as_database_error()
            .and_then(|d| d.code())
            .is_some_and(|code| code == UNIQUE_VIOLATION);

        if unique_violation {
            tracing::warn!(error = %err, "Unique constraint violated");
            AppError::Conflict("The change conflicts with a concurrent update, retry".to_string())
        } else {
            AppError::Database(err)
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized => AppError::Unauthorized,
            AuthError::SessionError => AppError::Internal(anyhow::anyhow!("session store failure")),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotFound(what) => AppError::NotFound(what.to_string()),
            DispatchError::AlreadyDispatched(status) => AppError::Conflict(format!(
                "Review request is already {} or being sent",
                status.as_str()
            )),
            DispatchError::Store(e) => e.into(),
            other => AppError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<CrmTriggerError> for AppError {
    fn from(err: CrmTriggerError) -> Self {
        match err {
            CrmTriggerError::Validation(msg) => AppError::Validation(msg),
            CrmTriggerError::Store(e) => e.into(),
            CrmTriggerError::Dispatch(e) => e.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
