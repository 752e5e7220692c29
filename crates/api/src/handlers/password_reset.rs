use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::handlers::{client_context, token_error, MessageResponse};
use crate::AppState;
use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use visor_auth::{ForgotPasswordRequest, ResetPasswordRequest};

#[derive(Debug, Deserialize)]
pub struct VerifyResetTokenQuery {
    pub token: String,
}

/// Request password reset
/// POST /api/auth/forgot-password
pub async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .password_reset_service
        .request_reset(request, &client_context(&headers))
        .await?;

    // Same answer whether or not the account exists
    Ok(Json(MessageResponse::new(
        "If an account exists with that email, a password reset link has been sent",
    )))
}

/// Verify reset token
/// GET /api/auth/verify-reset-token?token=xxx
pub async fn verify_reset_token(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<VerifyResetTokenQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .password_reset_service
        .verify_token(&query.token)
        .await
        .map_err(token_error)?;

    Ok(Json(MessageResponse::new("Token is valid")))
}

/// Reset password with token
/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .password_reset_service
        .reset_password(request)
        .await
        .map_err(token_error)?;

    Ok(Json(MessageResponse::new(
        "Password reset successfully. Please log in with your new password.",
    )))
}
