use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use visor_auth::AuthError;
use visor_authz::AuthzError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

/// Error returned by every handler
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// Logs the detail and hides it from the client
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {}", detail);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "An internal error occurred",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(ErrorResponse::new(self.code, &self.message))).into_response();

        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::new(
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Invalid email or password",
            ),
            AuthError::UserInactive => {
                Self::new(StatusCode::FORBIDDEN, "user_inactive", err.to_string())
            }
            AuthError::InvalidToken(_) => {
                Self::new(StatusCode::UNAUTHORIZED, "invalid_token", err.to_string())
            }
            AuthError::TokenExpired => {
                Self::new(StatusCode::UNAUTHORIZED, "token_expired", err.to_string())
            }
            AuthError::WeakPassword(msg) => Self::new(StatusCode::BAD_REQUEST, "weak_password", msg),
            AuthError::ValidationError(msg) => {
                Self::new(StatusCode::BAD_REQUEST, "validation_error", msg)
            }
            AuthError::BadRequest(msg) => Self::bad_request(msg),
            AuthError::UserNotFound => Self::not_found(err.to_string()),
            AuthError::NotFound(msg) => Self::not_found(msg),
            AuthError::AlreadyExists(msg) => Self::new(StatusCode::CONFLICT, "conflict", msg),
            AuthError::DatabaseError(_)
            | AuthError::CacheError(_)
            | AuthError::PasswordHashError(_)
            | AuthError::JwtError(_)
            | AuthError::Email(_)
            | AuthError::Internal(_)
            | AuthError::ConfigurationError(_) => Self::internal(err),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotFound(msg) => Self::not_found(msg),
            AuthzError::AlreadyExists(msg) => Self::new(StatusCode::CONFLICT, "conflict", msg),
            AuthzError::PermissionDenied(msg) => Self::forbidden(msg),
            AuthzError::ValidationError(msg) => {
                Self::new(StatusCode::BAD_REQUEST, "validation_error", msg)
            }
            AuthzError::BadRequest(msg) => Self::bad_request(msg),
            AuthzError::Database(_) | AuthzError::CacheError(_) => Self::internal(err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "invalid_request", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(rejection.status(), "invalid_request", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), "invalid_request", rejection.body_text())
    }
}

/// Turns a handler panic into the regular JSON 500
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    ApiError::internal(format!("handler panicked: {}", detail)).into_response()
}
