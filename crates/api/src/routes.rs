use crate::error::handle_panic;
use crate::handlers;
use crate::middleware;
use crate::AppState;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub fn create_router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        // Auth routes
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/refresh", post(handlers::auth::refresh_token))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/access-denied", get(handlers::auth::access_denied))
        .route("/api/auth/signin-google", get(handlers::auth::signin_google))
        // Password reset routes
        .route(
            "/api/auth/forgot-password",
            post(handlers::password_reset::request_password_reset),
        )
        .route(
            "/api/auth/verify-reset-token",
            get(handlers::password_reset::verify_reset_token),
        )
        .route(
            "/api/auth/reset-password",
            post(handlers::password_reset::reset_password),
        )
        // Invitation routes - Public endpoints
        .route("/api/invitations/verify", get(handlers::invitation::verify_invitation))
        .route("/api/invitations/accept", post(handlers::invitation::accept_invitation));

    let protected = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/auth/change-password", post(handlers::auth::change_password))
        // Users
        .route(
            "/api/users",
            get(handlers::user::list_users).post(handlers::user::create_user),
        )
        .route(
            "/api/users/:id",
            get(handlers::user::get_user)
                .put(handlers::user::update_user)
                .delete(handlers::user::delete_user),
        )
        .route("/api/users/:id/deactivate", post(handlers::user::deactivate_user))
        .route(
            "/api/users/:id/roles",
            get(handlers::user::list_user_roles).post(handlers::user::assign_role),
        )
        .route(
            "/api/users/:id/roles/:role_id",
            axum::routing::delete(handlers::user::revoke_role),
        )
        .route("/api/users/:id/privileges", get(handlers::user::user_privileges))
        // Roles
        .route(
            "/api/roles",
            get(handlers::role::list_roles).post(handlers::role::create_role),
        )
        .route(
            "/api/roles/:id",
            get(handlers::role::get_role)
                .put(handlers::role::update_role)
                .delete(handlers::role::delete_role),
        )
        .route(
            "/api/roles/:id/policies",
            get(handlers::role::list_role_policies).post(handlers::role::attach_policy),
        )
        .route(
            "/api/roles/:id/policies/:policy_id",
            axum::routing::delete(handlers::role::detach_policy),
        )
        // Policies
        .route(
            "/api/policies",
            get(handlers::policy::list_policies).post(handlers::policy::create_policy),
        )
        .route(
            "/api/policies/:id",
            get(handlers::policy::get_policy)
                .put(handlers::policy::update_policy)
                .delete(handlers::policy::delete_policy),
        )
        // Invitations
        .route(
            "/api/invitations",
            get(handlers::invitation::list_invitations)
                .post(handlers::invitation::create_invitation),
        )
        .route(
            "/api/invitations/:id",
            get(handlers::invitation::get_invitation)
                .delete(handlers::invitation::revoke_invitation),
        )
        .route(
            "/api/invitations/:id/resend",
            post(handlers::invitation::resend_invitation),
        )
        // Privileges
        .route("/api/privileges/me", get(handlers::privilege::my_privileges))
        .route("/api/privileges/check", get(handlers::privilege::check_privilege))
        .route_layer(from_fn(middleware::require_auth));

    let mut app = public
        .merge(protected)
        .fallback_service(ServeDir::new(&state.config.server.web_root))
        .layer(from_fn_with_state(state.clone(), middleware::session_layer))
        .layer(from_fn_with_state(state.clone(), middleware::authenticate))
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CatchPanicLayer::custom(handle_panic));

    if !state.config.is_development() {
        app = app.layer(from_fn(middleware::redirect_to_https));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
