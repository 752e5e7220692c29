use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::handlers::authorize;
use crate::middleware::AuthUser;
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use visor_authz::{actions, resources};
use visor_models::{NewRole, Policy, Role, UpdateRole};

#[derive(Debug, Deserialize)]
pub struct AttachPolicyRequest {
    pub policy_id: Uuid,
}

/// GET /api/roles
pub async fn list_roles(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Role>>, ApiError> {
    authorize(&state, &user, resources::ROLES, actions::READ).await?;
    Ok(Json(state.role_service.list().await?))
}

/// GET /api/roles/:id
pub async fn get_role(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Role>, ApiError> {
    authorize(&state, &user, resources::ROLES, actions::READ).await?;
    Ok(Json(state.role_service.get(id).await?))
}

/// POST /api/roles
pub async fn create_role(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<NewRole>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    authorize(&state, &user, resources::ROLES, actions::CREATE).await?;
    Ok((StatusCode::CREATED, Json(state.role_service.create(request).await?)))
}

/// PUT /api/roles/:id
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<UpdateRole>,
) -> Result<Json<Role>, ApiError> {
    authorize(&state, &user, resources::ROLES, actions::UPDATE).await?;
    Ok(Json(state.role_service.update(id, update).await?))
}

/// DELETE /api/roles/:id
pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &user, resources::ROLES, actions::DELETE).await?;
    state.role_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/roles/:id/policies
pub async fn list_role_policies(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Vec<Policy>>, ApiError> {
    authorize(&state, &user, resources::ROLES, actions::READ).await?;
    Ok(Json(state.role_service.role_policies(id).await?))
}

/// POST /api/roles/:id/policies
pub async fn attach_policy(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<AttachPolicyRequest>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &user, resources::ROLES, actions::UPDATE).await?;
    state.role_service.attach_policy(id, request.policy_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/roles/:id/policies/:policy_id
pub async fn detach_policy(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath((id, policy_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &user, resources::ROLES, actions::UPDATE).await?;
    state.role_service.detach_policy(id, policy_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
