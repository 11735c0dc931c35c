//! E2E tests for the internal provisioning endpoint

mod common;

use common::{INTERNAL_ROLE, TestServer};
use postdeck::api::CreateInternalUserResponse;
use postdeck::data::Role;
use serde_json::json;

async fn post_user(
    server: &TestServer,
    token: Option<&str>,
    body: serde_json::Value,
) -> reqwest::Response {
    let mut request = server.client.post(server.url("/internal/users")).json(&body);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    request.send().await.unwrap()
}

#[tokio::test]
async fn test_create_user_is_idempotent() {
    let server = TestServer::new().await;
    let token = server.service_token(&[INTERNAL_ROLE]);
    let body = json!({"id": "sso-42", "email": "new@example.com", "name": "Acme"});

    let first = post_user(&server, Some(&token), body.clone()).await;
    assert_eq!(first.status(), 200);
    let first: CreateInternalUserResponse = first.json().await.unwrap();
    assert!(first.success);
    assert_eq!(first.user_id, "sso-42");

    let second = post_user(&server, Some(&token), body).await;
    assert_eq!(second.status(), 200);
    let second: CreateInternalUserResponse = second.json().await.unwrap();
    assert_eq!(second.user_id, first.user_id);

    let db = &server.state.db;
    assert_eq!(db.count_organizations_for_user("sso-42").await.unwrap(), 1);

    let user = db.get_user("sso-42").await.unwrap().unwrap();
    assert_eq!(user.email, "new@example.com");
    assert!(user.activated);

    let orgs = db.get_organizations_for_user("sso-42").await.unwrap();
    assert_eq!(orgs[0].organization.name, "Acme");
    assert_eq!(orgs[0].members[0].role, Role::Admin);
}

#[tokio::test]
async fn test_response_uses_camel_case() {
    let server = TestServer::new().await;
    let token = server.service_token(&[INTERNAL_ROLE]);

    let response = post_user(
        &server,
        Some(&token),
        json!({"id": "sso-camel", "email": "camel@example.com"}),
    )
    .await;
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({"success": true, "userId": "sso-camel"}));
}

#[tokio::test]
async fn test_organization_name_falls_back_to_email() {
    let server = TestServer::new().await;
    let token = server.service_token(&[INTERNAL_ROLE]);

    let response = post_user(
        &server,
        Some(&token),
        json!({"id": "sso-noname", "email": "noname@example.com"}),
    )
    .await;
    assert_eq!(response.status(), 200);

    let orgs = server
        .state
        .db
        .get_organizations_for_user("sso-noname")
        .await
        .unwrap();
    assert_eq!(orgs.len(), 1);
    assert_eq!(orgs[0].organization.name, "noname@example.com");
}

#[tokio::test]
async fn test_provisioned_user_can_open_dashboard() {
    let server = TestServer::new().await;
    let token = server.service_token(&[INTERNAL_ROLE]);
    post_user(
        &server,
        Some(&token),
        json!({"id": "sso-dash", "email": "dash@example.com"}),
    )
    .await;

    let user_token = server.sso_token("sso-dash", None);
    let response = server.get_authed("/dashboard/summary", &user_token).await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_accepts_role_token_without_subject() {
    let server = TestServer::new().await;
    let claims = json!({
        "roles": [INTERNAL_ROLE],
        "exp": (chrono::Utc::now() + chrono::Duration::minutes(5)).timestamp(),
    });
    let token = postdeck::auth::token::issue_token(&claims, common::JWT_SECRET).unwrap();

    let response = post_user(
        &server,
        Some(&token),
        json!({"id": "sso-nosub", "email": "nosub@example.com"}),
    )
    .await;
    assert_eq!(response.status(), 200);

    let body: CreateInternalUserResponse = response.json().await.unwrap();
    assert_eq!(body.user_id, "sso-nosub");
}

#[tokio::test]
async fn test_rejects_missing_or_wrong_credentials() {
    let server = TestServer::new().await;
    let body = json!({"id": "sso-denied", "email": "denied@example.com"});

    let missing = post_user(&server, None, body.clone()).await;
    assert_eq!(missing.status(), 403);

    let wrong_role = server.service_token(&["some-other-role"]);
    let response = post_user(&server, Some(&wrong_role), body.clone()).await;
    assert_eq!(response.status(), 403);

    let garbage = post_user(&server, Some("not-a-jwt"), body.clone()).await;
    assert_eq!(garbage.status(), 403);

    // The role token is only accepted as a bearer credential
    let token = server.service_token(&[INTERNAL_ROLE]);
    let via_header = server
        .client
        .post(server.url("/internal/users"))
        .header("auth", &token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(via_header.status(), 403);

    assert!(server.state.db.get_user("sso-denied").await.unwrap().is_none());
}

#[tokio::test]
async fn test_rejects_blank_fields() {
    let server = TestServer::new().await;
    let token = server.service_token(&[INTERNAL_ROLE]);

    let blank_id = post_user(
        &server,
        Some(&token),
        json!({"id": "  ", "email": "a@example.com"}),
    )
    .await;
    assert_eq!(blank_id.status(), 400);

    let blank_email =
        post_user(&server, Some(&token), json!({"id": "sso-x", "email": ""})).await;
    assert_eq!(blank_email.status(), 400);
}
