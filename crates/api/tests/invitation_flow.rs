mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use serde_json::json;

async fn role_id(app: &TestApp, token: &str, name: &str) -> String {
    let response = app.send(authed_request("GET", "/api/roles", token)).await;
    read_json(response)
        .await
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == name)
        .and_then(|r| r["id"].as_str())
        .expect("role")
        .to_string()
}

#[tokio::test]
async fn invite_verify_and_accept() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let admin_role = role_id(&app, &admin, "admin").await;

    let response = app
        .send(authed_json_request(
            "POST",
            "/api/invitations",
            &admin,
            json!({ "email": "Invitee@Example.com", "role_id": admin_role, "expires_in_days": 3 }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let invitation = read_json(response).await;
    assert_eq!(invitation["status"], "pending");
    assert_eq!(invitation["email"], "invitee@example.com");

    let sent = app.email.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "invitee@example.com");
    assert!(sent[0].text_body.contains("https://visor.test/accept-invitation?token="));
    let token = app.last_emailed_token();

    let response = app
        .send(
            Request::get(format!("/api/invitations/verify?token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let preview = read_json(response).await;
    assert_eq!(preview["email"], "invitee@example.com");
    assert_eq!(preview["role_name"], "admin");

    let response = app
        .send(json_request(
            "POST",
            "/api/invitations/accept",
            json!({ "token": token, "password": USER_PASSWORD, "first_name": "Ivy" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(set_cookie(&response, "__visor_auth").is_some());
    let accepted = read_json(response).await;
    assert_eq!(accepted["roles"], json!(["admin"]));
    assert_eq!(accepted["user"]["email_verified"], true);

    // The token is spent
    let response = app
        .send(json_request(
            "POST",
            "/api/invitations/accept",
            json!({ "token": token, "password": USER_PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(authed_request(
            "GET",
            &format!("/api/invitations/{}", invitation["id"].as_str().unwrap()),
            &admin,
        ))
        .await;
    assert_eq!(read_json(response).await["status"], "accepted");
}

#[tokio::test]
async fn invitation_guards() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    // Existing account
    let response = app
        .send(authed_json_request(
            "POST",
            "/api/invitations",
            &admin,
            json!({ "email": ADMIN_EMAIL }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Expiry outside 1..=30 days
    let response = app
        .send(authed_json_request(
            "POST",
            "/api/invitations",
            &admin,
            json!({ "email": "late@example.com", "expires_in_days": 31 }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(authed_json_request(
            "POST",
            "/api/invitations",
            &admin,
            json!({ "email": "twice@example.com" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = read_json(response).await["id"].as_str().unwrap().to_string();

    // Cooldown on a fresh pending invitation
    let response = app
        .send(authed_json_request(
            "POST",
            "/api/invitations",
            &admin,
            json!({ "email": "twice@example.com" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Resend replaces the token
    let first_token = app.last_emailed_token();
    let response = app
        .send(authed_request("POST", &format!("/api/invitations/{}/resend", id), &admin))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let second_token = app.last_emailed_token();
    assert_ne!(first_token, second_token);

    let response = app
        .send(
            Request::get(format!("/api/invitations/verify?token={}", first_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Revoked invitations cannot be accepted
    let response = app
        .send(authed_request("DELETE", &format!("/api/invitations/{}", id), &admin))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(json_request(
            "POST",
            "/api/invitations/accept",
            json!({ "token": second_token, "password": USER_PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.send(authed_request("GET", "/api/invitations", &admin)).await;
    let list = read_json(response).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["status"], "revoked");
}

#[tokio::test]
async fn accepting_without_a_role_grants_the_default() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    app.send(authed_json_request(
        "POST",
        "/api/invitations",
        &admin,
        json!({ "email": "plain@example.com" }),
    ))
    .await;
    let token = app.last_emailed_token();

    let response = app
        .send(json_request(
            "POST",
            "/api/invitations/accept",
            json!({ "token": token, "password": USER_PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(read_json(response).await["roles"], json!(["user"]));
}
