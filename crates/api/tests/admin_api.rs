mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use serde_json::json;

#[tokio::test]
async fn regular_users_are_forbidden() {
    let app = TestApp::new().await;
    let token = access_token(&app.register("plain@example.com").await);

    for uri in ["/api/users", "/api/roles", "/api/policies", "/api/invitations"] {
        let response = app.send(authed_request("GET", uri, &token)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(read_json(response).await["error"], "forbidden");
    }

    // Self-service policy comes with the default role
    let response = app
        .send(authed_request("GET", "/api/privileges/check?resource=profile&action=update", &token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["allowed"], true);
    assert_eq!(body["policy"], "self-service");

    let response = app
        .send(authed_request("GET", "/api/privileges/check?resource=users&action=read", &token))
        .await;
    assert_eq!(read_json(response).await["allowed"], false);
}

#[tokio::test]
async fn admin_manages_users() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let response = app
        .send(authed_json_request(
            "POST",
            "/api/users",
            &admin,
            json!({ "email": "New@Example.com", "password": USER_PASSWORD, "first_name": "New" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let user = read_json(response).await;
    let user_id = user["id"].as_str().unwrap().to_string();
    assert_eq!(user["email"], "new@example.com");

    let response = app
        .send(authed_request("GET", "/api/users?page=1&per_page=1", &admin))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = read_json(response).await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);

    let response = app
        .send(authed_request("GET", "/api/users?per_page=101", &admin))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(authed_request("GET", "/api/users?page=9223372036854775807&per_page=100", &admin))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "validation_error");

    let response = app
        .send(authed_json_request(
            "PUT",
            &format!("/api/users/{}", user_id),
            &admin,
            json!({ "last_name": "Person" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["last_name"], "Person");

    // Deactivated users cannot sign in
    let response = app
        .send(authed_request("POST", &format!("/api/users/{}/deactivate", user_id), &admin))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.login("new@example.com", USER_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json(response).await["error"], "user_inactive");

    let response = app
        .send(authed_request("DELETE", &format!("/api/users/{}", user_id), &admin))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app
        .send(authed_request("GET", &format!("/api/users/{}", user_id), &admin))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn granted_policies_take_effect_immediately() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let body = app.register("reader@example.com").await;
    let reader = access_token(&body);
    let reader_id = body["user"]["id"].as_str().unwrap().to_string();

    // Prime the privilege cache with the denial
    let response = app.send(authed_request("GET", "/api/users", &reader)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(authed_json_request(
            "POST",
            "/api/roles",
            &admin,
            json!({ "name": "auditors", "description": "Read-only staff" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let role_id = read_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .send(authed_json_request(
            "POST",
            "/api/policies",
            &admin,
            json!({
                "name": "read-users",
                "effect": "allow",
                "resource": "users",
                "actions": ["read"]
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let policy_id = read_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .send(authed_json_request(
            "POST",
            &format!("/api/roles/{}/policies", role_id),
            &admin,
            json!({ "policy_id": policy_id }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(authed_json_request(
            "POST",
            &format!("/api/users/{}/roles", reader_id),
            &admin,
            json!({ "role_id": role_id }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.send(authed_request("GET", "/api/users", &reader)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Reading is not deleting
    let response = app
        .send(authed_request("DELETE", &format!("/api/users/{}", reader_id), &reader))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(authed_request("GET", &format!("/api/users/{}/privileges", reader_id), &admin))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let names: Vec<String> = read_json(response).await["policies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    assert!(names.contains(&"read-users".to_string()));
    assert!(names.contains(&"self-service".to_string()));

    // A deny on the same resource wins
    let response = app
        .send(authed_json_request(
            "POST",
            "/api/policies",
            &admin,
            json!({
                "name": "no-user-reads",
                "effect": "deny",
                "resource": "*",
                "actions": ["read"]
            }),
        ))
        .await;
    let deny_id = read_json(response).await["id"].as_str().unwrap().to_string();
    app.send(authed_json_request(
        "POST",
        &format!("/api/roles/{}/policies", role_id),
        &admin,
        json!({ "policy_id": deny_id }),
    ))
    .await;

    let response = app.send(authed_request("GET", "/api/users", &reader)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Revoking the role removes both
    let response = app
        .send(authed_request(
            "DELETE",
            &format!("/api/users/{}/roles/{}", reader_id, role_id),
            &admin,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app
        .send(authed_request("GET", &format!("/api/users/{}/roles", reader_id), &admin))
        .await;
    let roles = read_json(response).await;
    assert_eq!(roles.as_array().unwrap().len(), 1);
    assert_eq!(roles[0]["name"], "user");
}

#[tokio::test]
async fn role_and_policy_rules() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let response = app.send(authed_request("GET", "/api/roles", &admin)).await;
    let roles = read_json(response).await;
    let admin_role = roles
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "admin")
        .expect("admin role")
        .clone();
    assert_eq!(admin_role["is_system"], true);
    let admin_role_id = admin_role["id"].as_str().unwrap();

    let response = app
        .send(authed_request("DELETE", &format!("/api/roles/{}", admin_role_id), &admin))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(authed_json_request(
            "PUT",
            &format!("/api/roles/{}", admin_role_id),
            &admin,
            json!({ "name": "superusers" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(authed_json_request("POST", "/api/roles", &admin, json!({ "name": "user" })))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .send(authed_json_request(
            "POST",
            "/api/policies",
            &admin,
            json!({ "name": "empty", "effect": "allow", "resource": "users", "actions": [] }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "validation_error");

    let response = app
        .send(authed_request(
            "GET",
            &format!("/api/roles/{}/policies", admin_role_id),
            &admin,
        ))
        .await;
    let policies = read_json(response).await;
    assert_eq!(policies[0]["name"], "full-access");

    let response = app
        .send(authed_request(
            "GET",
            "/api/roles/00000000-0000-0000-0000-000000000000",
            &admin,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn my_privileges_lists_effective_policies() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let response = app.send(authed_request("GET", "/api/privileges/me", &admin)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["policies"][0]["name"], "full-access");
    assert_eq!(body["policies"][0]["resource"], "*");
}

#[tokio::test]
async fn malformed_requests_get_json_errors() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let request = Request::post("/api/auth/login")
        .header("content-type", "application/json")
        .body(Body::from("{"))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"], "invalid_request");
    assert!(body["message"].as_str().unwrap().contains("JSON"));

    let response = app
        .send(authed_request("GET", "/api/users/not-a-uuid", &admin))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "invalid_request");

    let response = app
        .send(authed_request("GET", "/api/users?page=first", &admin))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "invalid_request");
}
