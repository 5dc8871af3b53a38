mod common;

use axum::http::{Method, StatusCode};
use common::{empty_request, json_request, raw_auth_request, spawn_app, PASSWORD};
use elearn::auth::{claims::Role, repo::UserRepo};
use serde_json::json;
use time::{Duration, OffsetDateTime};

#[tokio::test]
async fn duplicate_email_conflicts_without_creating_a_row() {
    let t = spawn_app();
    t.signup("ivy", "user").await;

    let (status, body) = t
        .send(json_request(
            Method::POST,
            "/register",
            None,
            json!({ "email": "IVY@example.com", "username": "ivy2", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
    assert!(t.store.find_user_by_username("ivy2").await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_role_fails_validation_before_insert() {
    let t = spawn_app();
    let (status, body) = t
        .send(json_request(
            Method::POST,
            "/register",
            None,
            json!({
                "email": "root@example.com",
                "username": "root",
                "password": PASSWORD,
                "role": "superuser",
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");
    assert_eq!(body["details"][0]["field"], "role");
    assert!(t.store.find_user_by_username("root").await.unwrap().is_none());
}

#[tokio::test]
async fn registration_reports_every_invalid_field() {
    let t = spawn_app();
    let (status, body) = t
        .send(json_request(
            Method::POST,
            "/register",
            None,
            json!({ "email": "nope", "username": "", "password": "short" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<_> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(fields, vec!["email", "username", "password"]);
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
    let t = spawn_app();
    t.signup("jack", "user").await;
    let (status, body) = t
        .send(json_request(
            Method::POST,
            "/login",
            None,
            json!({ "email": "jack@example.com", "password": "not-the-password" }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_credentials");
}

#[tokio::test]
async fn me_returns_public_fields_and_soft_delete_blocks_login() {
    let t = spawn_app();
    let (id, token) = t.signup("kate", "admin").await;

    let (status, me) = t.send(empty_request(Method::GET, "/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], id.as_str());
    assert_eq!(me["role"], "admin");
    assert!(me.get("password_hash").is_none());

    let (status, _) = t
        .send(empty_request(Method::DELETE, "/me", Some(&token)))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = t
        .send(json_request(
            Method::POST,
            "/login",
            None,
            json!({ "email": "kate@example.com", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_credentials");

    let (status, _) = t.send(empty_request(Method::GET, "/me", Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn soft_deleted_account_cannot_enroll_with_its_old_token() {
    let t = spawn_app();
    let (_, admin) = t.signup("root", "admin").await;
    let (_, token) = t.signup("leo", "user").await;
    let course = t.create_course(&admin, "Rust").await;
    let course_id = course["id"].as_str().unwrap();

    let (status, _) = t
        .send(empty_request(Method::DELETE, "/me", Some(&token)))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = t
        .send(empty_request(
            Method::POST,
            &format!("/course/{course_id}/enroll"),
            Some(&token),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");
    assert_eq!(body["error"], "not_found");

    let (status, body) = t
        .send(empty_request(
            Method::GET,
            &format!("/course/{course_id}/lessons"),
            Some(&token),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "not_enrolled");
}

#[tokio::test]
async fn short_or_prefixless_headers_are_missing_credential() {
    let t = spawn_app();
    for header in ["", "B", "Bear", "Bearer", "Bearer ", "Basic dXNlcjpwYXNz", "bearer abc"] {
        let (status, body) = t.send(raw_auth_request("/me", header)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "header {header:?}");
        assert_eq!(body["error"], "missing_credential", "header {header:?}");
    }
}

#[tokio::test]
async fn garbage_token_is_malformed() {
    let t = spawn_app();
    let (status, body) = t.send(raw_auth_request("/me", "Bearer not.a.jwt")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "malformed");
}

#[tokio::test]
async fn expired_token_is_rejected_as_expired() {
    let t = spawn_app();
    let (id, _) = t.signup("liam", "user").await;
    let issued = OffsetDateTime::now_utc() - Duration::hours(73);
    let token = t
        .state
        .jwt
        .issue_at(id.parse().unwrap(), Role::User, issued)
        .unwrap();

    let (status, body) = t.send(empty_request(Method::GET, "/me", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "expired");
}

#[tokio::test]
async fn health_is_public() {
    let t = spawn_app();
    let (status, body) = t.send(empty_request(Method::GET, "/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}
