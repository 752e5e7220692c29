#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use visor_api::{bootstrap, create_router, AppConfig, AppState};
use visor_auth::EmailService;
use visor_cache::Cache;
use visor_database::Database;

pub const JWT_KEY: &str = "test-secret-key-min-32-characters-long";
pub const ADMIN_EMAIL: &str = "admin@visor.local";
pub const ADMIN_PASSWORD: &str = "Adm1nPassword";
pub const USER_PASSWORD: &str = "Str0ngPassword";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub email: EmailService,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.jwt.key = JWT_KEY.to_string();
    config.admin.email = Some(ADMIN_EMAIL.to_string());
    config.admin.password = Some(ADMIN_PASSWORD.to_string());
    config.server.base_url = "https://visor.test".to_string();
    config.server.web_root = concat!(env!("CARGO_MANIFEST_DIR"), "/../../wwwroot").to_string();
    config
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let email = EmailService::outbox();
        let state = AppState::with_backends(
            config,
            Database::in_memory(),
            Cache::in_memory(1_000),
            email.clone(),
        )
        .expect("state");
        let state = Arc::new(state);
        bootstrap::prepare_database(&state).await;

        Self {
            router: create_router(state.clone()),
            state,
            email,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.expect("response")
    }

    /// Register a user and return the login response body
    pub async fn register(&self, email: &str) -> Value {
        let response = self
            .send(json_request(
                "POST",
                "/api/auth/register",
                json!({ "email": email, "password": USER_PASSWORD }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        read_json(response).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.send(json_request(
            "POST",
            "/api/auth/login",
            json!({ "email": email, "password": password }),
        ))
        .await
    }

    pub async fn admin_token(&self) -> String {
        let response = self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        assert_eq!(response.status(), StatusCode::OK);
        access_token(&read_json(response).await)
    }

    /// Token from the most recent email's link
    pub fn last_emailed_token(&self) -> String {
        let sent = self.email.sent();
        let body = &sent.last().expect("email sent").text_body;
        let rest = body.split("token=").nth(1).expect("link with token");
        rest.split_whitespace().next().expect("token").to_string()
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn authed_json_request(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    let mut request = json_request(method, uri, body);
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", token).parse().expect("header"),
    );
    request
}

pub fn authed_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .expect("request")
}

pub fn cookie_request(method: &str, uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("cookie", cookie)
        .body(Body::empty())
        .expect("request")
}

pub async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub async fn read_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf-8")
}

pub fn access_token(body: &Value) -> String {
    body["access_token"].as_str().expect("access_token").to_string()
}

/// Full Set-Cookie value for `name`, if the response sets it
pub fn set_cookie(response: &Response, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&prefix))
        .map(str::to_string)
}

/// `name=value` part of a Set-Cookie header, ready for a Cookie header
pub fn cookie_pair(response: &Response, name: &str) -> Option<String> {
    set_cookie(response, name).and_then(|v| v.split(';').next().map(str::to_string))
}
