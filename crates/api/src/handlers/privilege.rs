use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::middleware::AuthUser;
use crate::AppState;
use axum::{
    extract::State,
    Extension, Json,
};
use std::sync::Arc;
use visor_authz::{CheckRequest, CheckResponse, PrivilegeSummary};

/// Effective policies of the caller
/// GET /api/privileges/me
pub async fn my_privileges(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<PrivilegeSummary>, ApiError> {
    Ok(Json(state.privileges.summary(user.user_id).await?))
}

/// Whether the caller may perform an action. Answers 200 either way.
/// GET /api/privileges/check?resource=users&action=read
pub async fn check_privilege(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(request): ApiQuery<CheckRequest>,
) -> Result<Json<CheckResponse>, ApiError> {
    let response = state
        .privileges
        .check(user.user_id, &request.resource, &request.action)
        .await?;

    Ok(Json(response))
}
