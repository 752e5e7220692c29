//! Server-side session state behind the `__visor_session` cookie.
//!
//! The cookie holds a random id; the data lives in the cache under
//! `session:<id>` and expires after the configured idle time.

use crate::middleware::auth::read_cookie;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use visor_cache::session_cache_key;

pub const SESSION_COOKIE_NAME: &str = "__visor_session";

pub const USER_ID_KEY: &str = "user_id";
pub const SIGNED_IN_AT_KEY: &str = "signed_in_at";

type SessionData = HashMap<String, Value>;

#[derive(Debug, Default)]
struct SessionInner {
    data: SessionData,
    cleared: bool,
}

/// Per-request handle, available to handlers as `Extension<Session>`
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    fn from_data(data: SessionData) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                data,
                cleared: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        // A panic while holding the lock leaves plain data behind
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.lock().data.get(key).cloned()?;
        serde_json::from_value(value).ok()
    }

    pub fn insert<T: Serialize>(&self, key: &str, value: T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        let mut inner = self.lock();
        inner.data.insert(key.to_string(), value);
        inner.cleared = false;
        Ok(())
    }

    /// Drop all data; the store entry and the cookie go with it
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.data.clear();
        inner.cleared = true;
    }

    pub fn is_empty(&self) -> bool {
        self.lock().data.is_empty()
    }

    fn snapshot(&self) -> (SessionData, bool) {
        let inner = self.lock();
        (inner.data.clone(), inner.cleared)
    }
}

pub fn session_cookie(id: &str) -> String {
    format!("{}={}; HttpOnly; SameSite=Lax; Path=/", SESSION_COOKIE_NAME, id)
}

pub fn clear_session_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE_NAME)
}

/// Run a store operation under the I/O timeout; `None` on failure or timeout
async fn bounded<T, E, F>(timeout: Duration, what: &str, op: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(timeout, op).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::warn!("Session {} failed: {}", what, e);
            None
        }
        Err(_) => {
            tracing::warn!("Session {} timed out after {:?}", what, timeout);
            None
        }
    }
}

/// Resume the session named by the cookie. A missing, failed or stalled load
/// starts an empty session that gets a fresh id once written.
async fn open_session<F, Fut, E>(
    existing_id: Option<String>,
    timeout: Duration,
    load: F,
) -> (Option<String>, Session)
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<Option<SessionData>, E>>,
    E: std::fmt::Display,
{
    let Some(id) = existing_id else {
        return (None, Session::default());
    };

    match bounded(timeout, "load", load(session_cache_key(&id))).await.flatten() {
        Some(data) => (Some(id), Session::from_data(data)),
        // An id whose data expired is not reused
        None => (None, Session::default()),
    }
}

pub async fn session_layer(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let io_timeout = Duration::from_secs(state.config.auth.session_io_timeout_secs);
    let idle_seconds = state.config.auth.session_idle_minutes * 60;

    let existing_id = read_cookie(request.headers(), SESSION_COOKIE_NAME)
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    let cache = state.cache.clone();
    let (session_id, session) = open_session(existing_id, io_timeout, move |key| async move {
        cache.get::<SessionData>(&key).await
    })
    .await;
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    let (data, cleared) = session.snapshot();

    if data.is_empty() {
        if let Some(id) = &session_id {
            bounded(io_timeout, "delete", state.cache.delete(&session_cache_key(id))).await;
            if cleared {
                append_cookie(&mut response, &clear_session_cookie());
            }
        }
        return response;
    }

    let (id, is_new) = match session_id {
        Some(id) => (id, false),
        None => (visor_auth::jwt::generate_secure_token(), true),
    };

    // Writing on every request keeps the idle window sliding
    let saved = bounded(
        io_timeout,
        "commit",
        state
            .cache
            .set(&session_cache_key(&id), &data, Some(idle_seconds)),
    )
    .await;

    if saved.is_some() && is_new {
        append_cookie(&mut response, &session_cookie(&id));
    }

    response
}

fn append_cookie(response: &mut Response, cookie: &str) {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visor_cache::{Cache, CacheError};

    #[test]
    fn test_session_handle_shares_state() {
        let session = Session::default();
        let handle = session.clone();
        assert!(session.is_empty());

        handle.insert(USER_ID_KEY, "42").unwrap();
        assert_eq!(session.get::<String>(USER_ID_KEY).as_deref(), Some("42"));

        session.clear();
        assert!(handle.is_empty());
        assert!(handle.snapshot().1);
    }

    #[test]
    fn test_insert_after_clear_keeps_session() {
        let session = Session::default();
        session.clear();
        session.insert("k", 1).unwrap();
        let (data, cleared) = session.snapshot();
        assert_eq!(data.len(), 1);
        assert!(!cleared);
    }

    #[tokio::test]
    async fn test_open_session_resumes_stored_data() {
        let cache = Cache::in_memory(100);
        let mut data = SessionData::new();
        data.insert(USER_ID_KEY.to_string(), Value::from("42"));
        cache.set(&session_cache_key("abc"), &data, Some(60)).await.unwrap();

        let (id, session) = open_session(Some("abc".to_string()), Duration::from_secs(1), |key| {
            let cache = cache.clone();
            async move { cache.get::<SessionData>(&key).await }
        })
        .await;
        assert_eq!(id.as_deref(), Some("abc"));
        assert_eq!(session.get::<String>(USER_ID_KEY).as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_idle_session_id_is_not_reused() {
        let cache = Cache::in_memory(100);
        let mut data = SessionData::new();
        data.insert(USER_ID_KEY.to_string(), Value::from("42"));
        cache.set(&session_cache_key("idle"), &data, Some(1)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1200)).await;

        let (id, session) = open_session(Some("idle".to_string()), Duration::from_secs(1), |key| {
            let cache = cache.clone();
            async move { cache.get::<SessionData>(&key).await }
        })
        .await;
        assert_eq!(id, None);
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn test_stalled_load_yields_empty_session() {
        let (id, session) = open_session(
            Some("slow".to_string()),
            Duration::from_millis(20),
            |_key| std::future::pending::<Result<Option<SessionData>, CacheError>>(),
        )
        .await;
        assert_eq!(id, None);
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_yields_empty_session() {
        let (id, session) = open_session(Some("broken".to_string()), Duration::from_secs(1), |_key| async {
            Err::<Option<SessionData>, _>(CacheError::Other("bad entry".to_string()))
        })
        .await;
        assert_eq!(id, None);
        assert!(session.is_empty());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc");
        assert_eq!(cookie, "__visor_session=abc; HttpOnly; SameSite=Lax; Path=/");
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}
