pub mod auth;
pub mod health;
pub mod invitation;
pub mod password_reset;
pub mod policy;
pub mod privilege;
pub mod role;
pub mod user;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::AppState;
use axum::http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use visor_auth::{AuthError, ClientContext};

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Caller address and agent as reported by the edge proxy
pub fn client_context(headers: &HeaderMap) -> ClientContext {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|h| h.to_str().ok()))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let user_agent = headers
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    ClientContext {
        ip_address,
        user_agent,
    }
}

/// 403 unless the caller's policies allow `action` on `resource`
pub async fn authorize(
    state: &AppState,
    user: &AuthUser,
    resource: &str,
    action: &str,
) -> Result<(), ApiError> {
    state.privileges.ensure(user.user_id, resource, action).await?;
    Ok(())
}

/// Emailed tokens are request data, not credentials: a bad one is a 400
pub fn token_error(err: AuthError) -> ApiError {
    match err {
        AuthError::InvalidToken(msg) => ApiError::new(StatusCode::BAD_REQUEST, "invalid_token", msg),
        AuthError::TokenExpired => {
            ApiError::new(StatusCode::BAD_REQUEST, "token_expired", "Token has expired")
        }
        other => other.into(),
    }
}
