use crate::error::ApiError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use visor_auth::{AuthTicket, Claims, AUTH_COOKIE_NAME};
use visor_database::DatabaseError;

/// Authenticated user context
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
}

impl AuthUser {
    fn from_claims(claims: Claims) -> Option<Self> {
        Some(Self {
            user_id: claims.user_id().ok()?,
            email: claims.email,
            roles: claims.roles,
        })
    }

    fn from_ticket(ticket: AuthTicket) -> Self {
        Self {
            user_id: ticket.user_id,
            email: ticket.email,
            roles: ticket.roles,
        }
    }
}

/// Bearer token from the Authorization header, if the header uses that scheme
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
}

pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .map(str::trim)
        .find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then_some(value)
        })
}

/// Set-Cookie value carrying a sealed ticket
pub fn auth_cookie(value: &str, max_age_seconds: i64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        AUTH_COOKIE_NAME, value, max_age_seconds
    )
}

pub fn clear_auth_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", AUTH_COOKIE_NAME)
}

/// Seal a new ticket for a freshly signed-in user
pub fn issue_auth_cookie(
    state: &AppState,
    user_id: Uuid,
    email: &str,
    roles: Vec<String>,
) -> Result<String, ApiError> {
    let lifetime = state.ticket_lifetime();
    let ticket = AuthTicket::new(user_id, email, roles, lifetime);
    let sealed = state.tickets.protect(&ticket)?;
    Ok(auth_cookie(&sealed, lifetime.num_seconds()))
}

/// Resolve the caller. A bearer header decides on its own; without one the
/// auth cookie is consulted and renewed once past half its lifetime.
/// Anonymous requests pass through untouched.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_bearer_token(request.headers()) {
        match state.auth_service.jwt().validate_access_token(token) {
            Ok(claims) => {
                if let Some(user) = AuthUser::from_claims(claims) {
                    request.extensions_mut().insert(user);
                }
            }
            Err(e) => tracing::debug!("Bearer token rejected: {}", e),
        }
        return next.run(request).await;
    }

    let ticket = read_cookie(request.headers(), AUTH_COOKIE_NAME)
        .and_then(|value| state.tickets.unprotect(value));

    let Some(ticket) = ticket else {
        return next.run(request).await;
    };

    let now = Utc::now();
    if ticket.is_expired_at(now) {
        tracing::debug!(user_id = %ticket.user_id, "Auth cookie expired");
        return next.run(request).await;
    }

    // The ticket outlives deactivation unless the account is checked here
    match state.db.users().find_by_id(ticket.user_id).await {
        Ok(user) if user.is_active => {}
        Ok(_) | Err(DatabaseError::NotFound(_)) => {
            tracing::debug!(user_id = %ticket.user_id, "Auth cookie for inactive or missing user");
            let mut response = next.run(request).await;
            if !sets_auth_cookie(&response) {
                append_cookie(&mut response, &clear_auth_cookie());
            }
            return response;
        }
        Err(e) => {
            tracing::warn!(user_id = %ticket.user_id, "Failed to load cookie user: {}", e);
            return next.run(request).await;
        }
    }

    let renewed = if ticket.needs_renewal_at(now) {
        let fresh = ticket.renewed_at(now);
        match state.tickets.protect(&fresh) {
            Ok(sealed) => Some(auth_cookie(&sealed, (fresh.expires_at - now).num_seconds())),
            Err(e) => {
                tracing::warn!("Failed to renew auth cookie: {}", e);
                None
            }
        }
    } else {
        None
    };

    request.extensions_mut().insert(AuthUser::from_ticket(ticket));
    let mut response = next.run(request).await;

    if let Some(cookie) = renewed.filter(|_| !sets_auth_cookie(&response)) {
        append_cookie(&mut response, &cookie);
    }

    response
}

/// A handler that signed the user out or in owns the cookie
fn sets_auth_cookie(response: &Response) -> bool {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(AUTH_COOKIE_NAME))
}

fn append_cookie(response: &mut Response, cookie: &str) {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
}

/// Middleware to require authentication
pub async fn require_auth(request: Request, next: Next) -> Response {
    if request.extensions().get::<AuthUser>().is_none() {
        return ApiError::unauthorized("Authentication is required").into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; __visor_auth=sealed; other=1"),
        );
        assert_eq!(read_cookie(&headers, AUTH_COOKIE_NAME), Some("sealed"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = auth_cookie("v", 3600);
        assert!(cookie.starts_with("__visor_auth=v;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(!cookie.contains("Secure"));
        assert!(clear_auth_cookie().contains("Max-Age=0"));
    }
}
