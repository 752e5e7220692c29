use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::handlers::{client_context, MessageResponse};
use crate::middleware::auth::{clear_auth_cookie, issue_auth_cookie};
use crate::middleware::session::{Session, SIGNED_IN_AT_KEY, USER_ID_KEY};
use crate::middleware::AuthUser;
use crate::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use visor_auth::{AuthResponse, LoginRequest, MeResponse, RefreshTokenRequest, RegisterRequest};
use visor_models::ChangePassword;

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Record the sign-in in the session and hand out the auth cookie next to
/// the token pair
pub(crate) fn signed_in(
    state: &AppState,
    session: &Session,
    status: StatusCode,
    response: AuthResponse,
) -> Result<Response, ApiError> {
    session
        .insert(USER_ID_KEY, response.user.id)
        .and_then(|_| session.insert(SIGNED_IN_AT_KEY, Utc::now()))
        .map_err(ApiError::internal)?;

    let cookie = issue_auth_cookie(state, response.user.id, &response.user.email, response.roles.clone())?;

    Ok((status, AppendHeaders([(header::SET_COOKIE, cookie)]), Json(response)).into_response())
}

/// Register a new user
/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<Response, ApiError> {
    let response = state
        .auth_service
        .register(request, &client_context(&headers))
        .await?;

    signed_in(&state, &session, StatusCode::CREATED, response)
}

/// Login with email and password
/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let email = request.email.clone();

    let response = match state.auth_service.login(request, &client_context(&headers)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(email = %email, "Login failed: {}", e);
            return Err(e.into());
        }
    };

    signed_in(&state, &session, StatusCode::OK, response)
}

/// Refresh access token
/// POST /api/auth/refresh
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<RefreshTokenRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let response = state
        .auth_service
        .refresh(&request.refresh_token, &client_context(&headers))
        .await?;

    Ok(Json(response))
}

/// Revoke the refresh session if one is supplied, then sign the browser out
/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    body: Option<Json<LogoutRequest>>,
) -> Result<Response, ApiError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    state
        .auth_service
        .logout(request.refresh_token.as_deref())
        .await?;

    session.clear();

    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders([(header::SET_COOKIE, clear_auth_cookie())]),
    )
        .into_response())
}

/// Get current user profile
/// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>, ApiError> {
    Ok(Json(state.auth_service.me(user.user_id).await?))
}

/// POST /api/auth/change-password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<ChangePassword>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .auth_service
        .change_password(user.user_id, request)
        .await?;

    Ok(Json(MessageResponse::new(
        "Password changed. Other sessions have been signed out.",
    )))
}

/// Where the cookie scheme sends callers that lack a privilege
/// GET /api/auth/access-denied
pub async fn access_denied() -> ApiError {
    ApiError::forbidden("You do not have access to this resource")
}

/// External sign-in is not enabled
/// GET /api/auth/signin-google
pub async fn signin_google() -> ApiError {
    ApiError::new(
        StatusCode::NOT_IMPLEMENTED,
        "not_implemented",
        "Google sign-in is not enabled",
    )
}
