#![allow(dead_code)]

use std::{path::Path, sync::Arc};

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use elearn::{
    app::build_app,
    config::{AppConfig, UploadConfig},
    state::AppState,
    store::memory::MemoryStore,
    uploads::LocalUploads,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const PASSWORD: &str = "correct-horse";
const BOUNDARY: &str = "elearn-test-boundary";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

pub fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::with_memory(store.clone());
    TestApp {
        app: build_app(state.clone()),
        state,
        store,
    }
}

/// Same as [`spawn_app`] but uploads are written to `dir` on disk.
pub fn spawn_app_with_local_uploads(dir: &Path) -> TestApp {
    let config = AppConfig {
        uploads: UploadConfig {
            dir: dir.to_string_lossy().into_owned(),
            public_prefix: "/uploads".into(),
        },
        ..AppConfig::ephemeral()
    };
    let uploads = Arc::new(LocalUploads::new(&config.uploads));
    let store = Arc::new(MemoryStore::new());
    let state = AppState::from_store(Arc::new(config), store.clone(), uploads);
    TestApp {
        app: build_app(state.clone()),
        state,
        store,
    }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let res = self.app.clone().oneshot(req).await.expect("infallible");
        let status = res.status();
        let bytes = res.into_body().collect().await.expect("body").to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    /// Registers and logs in, returning `(user id, bearer token)`.
    pub async fn signup(&self, username: &str, role: &str) -> (String, String) {
        let email = format!("{username}@example.com");
        let (status, user) = self
            .send(json_request(
                Method::POST,
                "/register",
                None,
                json!({ "email": email, "username": username, "password": PASSWORD, "role": role }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {username}: {user}");
        let token = self.login(&email).await;
        (user["id"].as_str().expect("id").to_string(), token)
    }

    pub async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .send(json_request(
                Method::POST,
                "/login",
                None,
                json!({ "email": email, "password": PASSWORD }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "login {email}: {body}");
        body["token"].as_str().expect("token").to_string()
    }

    pub async fn create_course(&self, admin_token: &str, name: &str) -> Value {
        let (status, course) = self
            .send(multipart_request(
                Method::POST,
                "/course",
                Some(admin_token),
                &[("name", name), ("description", "intro"), ("price", "10")],
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create course: {course}");
        course
    }
}

fn builder(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let mut b = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        b = b.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    b
}

pub fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    builder(method, uri, token).body(Body::empty()).unwrap()
}

pub fn raw_auth_request(uri: &str, authorization: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, authorization)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    builder(method, uri, token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Builds a `multipart/form-data` request; `file` is `(field, file name, bytes)`.
pub fn multipart_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    builder(method, uri, token)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
