use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
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
use visor_auth::{CreateUserRequest, Page, PageRequest};
use visor_authz::{actions, resources, PrivilegeSummary};
use visor_models::{Role, UpdateUser, UserProfile};

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role_id: Uuid,
}

/// GET /api/users?page=1&per_page=20
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> Result<Json<Page<UserProfile>>, ApiError> {
    authorize(&state, &user, resources::USERS, actions::READ).await?;
    Ok(Json(state.user_service.list(page).await?))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UserProfile>, ApiError> {
    authorize(&state, &user, resources::USERS, actions::READ).await?;
    Ok(Json(state.user_service.get(id).await?))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    authorize(&state, &user, resources::USERS, actions::CREATE).await?;

    let created = state.user_service.create(request, user.user_id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/users/:id
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<UpdateUser>,
) -> Result<Json<UserProfile>, ApiError> {
    authorize(&state, &user, resources::USERS, actions::UPDATE).await?;
    Ok(Json(state.user_service.update(id, update).await?))
}

/// Disable sign-in and revoke refresh sessions
/// POST /api/users/:id/deactivate
pub async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UserProfile>, ApiError> {
    authorize(&state, &user, resources::USERS, actions::UPDATE).await?;

    if id == user.user_id {
        return Err(ApiError::bad_request("You cannot deactivate your own account"));
    }

    Ok(Json(state.user_service.deactivate(id).await?))
}

/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &user, resources::USERS, actions::DELETE).await?;

    if id == user.user_id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    state.user_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/users/:id/roles
pub async fn list_user_roles(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Vec<Role>>, ApiError> {
    authorize(&state, &user, resources::USERS, actions::READ).await?;
    Ok(Json(state.role_service.user_roles(id).await?))
}

/// POST /api/users/:id/roles
pub async fn assign_role(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<AssignRoleRequest>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &user, resources::USERS, actions::UPDATE).await?;

    state
        .role_service
        .assign_to_user(id, request.role_id, Some(user.user_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/users/:id/roles/:role_id
pub async fn revoke_role(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath((id, role_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &user, resources::USERS, actions::UPDATE).await?;

    state.role_service.revoke_from_user(id, role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/users/:id/privileges
pub async fn user_privileges(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<PrivilegeSummary>, ApiError> {
    authorize(&state, &user, resources::USERS, actions::READ).await?;

    // Confirms the user exists
    state.user_service.get(id).await?;
    Ok(Json(state.privileges.summary(id).await?))
}
