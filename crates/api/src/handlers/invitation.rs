use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::handlers::auth::signed_in;
use crate::handlers::{authorize, client_context, token_error};
use crate::middleware::{AuthUser, Session};
use crate::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use visor_auth::{AcceptInvitationRequest, CreateInvitationRequest, InvitationPreview};
use visor_authz::{actions, resources};
use visor_models::InvitationSummary;

#[derive(Debug, Deserialize)]
pub struct VerifyInvitationQuery {
    pub token: String,
}

/// POST /api/invitations
pub async fn create_invitation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<InvitationSummary>), ApiError> {
    authorize(&state, &user, resources::INVITATIONS, actions::CREATE).await?;

    let invitation = state
        .invitation_service
        .create(request, user.user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(invitation)))
}

/// GET /api/invitations
pub async fn list_invitations(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<InvitationSummary>>, ApiError> {
    authorize(&state, &user, resources::INVITATIONS, actions::READ).await?;
    Ok(Json(state.invitation_service.list().await?))
}

/// GET /api/invitations/:id
pub async fn get_invitation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<InvitationSummary>, ApiError> {
    authorize(&state, &user, resources::INVITATIONS, actions::READ).await?;
    Ok(Json(state.invitation_service.get(id).await?))
}

/// DELETE /api/invitations/:id
pub async fn revoke_invitation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &user, resources::INVITATIONS, actions::DELETE).await?;
    state.invitation_service.revoke(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/invitations/:id/resend
pub async fn resend_invitation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<InvitationSummary>, ApiError> {
    authorize(&state, &user, resources::INVITATIONS, actions::UPDATE).await?;
    Ok(Json(state.invitation_service.resend(id).await?))
}

/// Check a token before showing the acceptance form
/// GET /api/invitations/verify?token=xxx
pub async fn verify_invitation(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<VerifyInvitationQuery>,
) -> Result<Json<InvitationPreview>, ApiError> {
    let preview = state
        .invitation_service
        .preview(&query.token)
        .await
        .map_err(token_error)?;

    Ok(Json(preview))
}

/// Create the invited account and sign it in
/// POST /api/invitations/accept
pub async fn accept_invitation(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<AcceptInvitationRequest>,
) -> Result<Response, ApiError> {
    let response = state
        .invitation_service
        .accept(request, &client_context(&headers))
        .await
        .map_err(token_error)?;

    signed_in(&state, &session, StatusCode::CREATED, response)
}
