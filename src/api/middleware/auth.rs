use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tower_sessions::Session;
use uuid::Uuid;

use super::session::SESSION_KEY_USER_ID;
use crate::error::AppError;

/// Authentication error responses
#[derive(Debug)]
pub enum AuthError {
    Unauthorized,
    SessionError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication required. Please log in.",
            ),
            AuthError::SessionError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Session error occurred.")
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// Middleware that requires the user to be authenticated
pub async fn require_auth(
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user_id: Option<Uuid> = session
        .get(SESSION_KEY_USER_ID)
        .await
        .map_err(|_| AuthError::SessionError)?;

    if user_id.is_none() {
        return Err(AuthError::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// The owner behind the current session
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

impl AuthenticatedUser {
    /// Rejects access to another tenant's resource
    pub fn ensure_owns(&self, owner_id: Uuid) -> Result<(), AppError> {
        if owner_id == self.user_id {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %self.user_id,
                owner_id = %owner_id,
                "Denied access to foreign resource"
            );
            Err(AppError::Forbidden)
        }
    }
}

/// Extracts the authenticated user ID from the session
pub async fn get_authenticated_user(session: &Session) -> Result<AuthenticatedUser, AuthError> {
    let user_id: Uuid = session
        .get(SESSION_KEY_USER_ID)
        .await
        .map_err(|_| AuthError::SessionError)?
        .ok_or(AuthError::Unauthorized)?;

    Ok(AuthenticatedUser { user_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_check() {
        let user = AuthenticatedUser {
            user_id: Uuid::new_v4(),
        };

        assert!(user.ensure_owns(user.user_id).is_ok());
        assert!(matches!(
            user.ensure_owns(Uuid::new_v4()),
            Err(AppError::Forbidden)
        ));
    }
}
