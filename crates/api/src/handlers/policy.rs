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
use std::sync::Arc;
use uuid::Uuid;
use visor_authz::{actions, resources};
use visor_models::{NewPolicy, Policy, UpdatePolicy};

/// GET /api/policies
pub async fn list_policies(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Policy>>, ApiError> {
    authorize(&state, &user, resources::POLICIES, actions::READ).await?;
    Ok(Json(state.policy_service.list().await?))
}

/// GET /api/policies/:id
pub async fn get_policy(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Policy>, ApiError> {
    authorize(&state, &user, resources::POLICIES, actions::READ).await?;
    Ok(Json(state.policy_service.get(id).await?))
}

/// POST /api/policies
pub async fn create_policy(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<NewPolicy>,
) -> Result<(StatusCode, Json<Policy>), ApiError> {
    authorize(&state, &user, resources::POLICIES, actions::CREATE).await?;
    Ok((StatusCode::CREATED, Json(state.policy_service.create(request).await?)))
}

/// PUT /api/policies/:id
pub async fn update_policy(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<UpdatePolicy>,
) -> Result<Json<Policy>, ApiError> {
    authorize(&state, &user, resources::POLICIES, actions::UPDATE).await?;
    Ok(Json(state.policy_service.update(id, update).await?))
}

/// DELETE /api/policies/:id
pub async fn delete_policy(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &user, resources::POLICIES, actions::DELETE).await?;
    state.policy_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
