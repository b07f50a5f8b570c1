#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use scribe::config::Config;
use scribe::db;
use scribe::state::AppState;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub struct TestApp {
    // Keeps the database directory alive for the test's duration
    _dir: TempDir,
    pub state: AppState,
    pub router: Router,
}

pub fn test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let pool =
        db::create_pool(&dir.path().join("test.db")).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    let mut config = Config::default();
    config.auth.secret = Some("integration-test-secret".to_string());
    config.auth.bcrypt_cost = 4;

    let state = AppState::new(pool, config).unwrap();
    let router = scribe::routes::app(state.clone());
    TestApp {
        _dir: dir,
        state,
        router,
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        match body {
            Some(body) => {
                let bytes = serde_json::to_vec(&body).unwrap();
                self.send_raw(method, uri, token, Some("application/json"), bytes)
                    .await
            }
            None => self.send_raw(method, uri, token, None, Vec::new()).await,
        }
    }

    /// Send `body` as-is, with `content_type` if given.
    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        content_type: Option<&str>,
        body: impl Into<Body>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let request = builder.body(body.into()).unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    /// Register and return the `data` block: user_id, username, access, refresh.
    pub async fn register(&self, username: &str, email: &str, phone: &str) -> Value {
        let (status, body) = self
            .post(
                "/user_auth/register_user/",
                None,
                registration(username, "pw123456", email, phone),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body["data"].clone()
    }
}

pub fn registration(username: &str, password: &str, email: &str, phone: &str) -> Value {
    json!({
        "username": username,
        "password": password,
        "profile": {
            "first_name": username[..1].to_uppercase() + &username[1..],
            "last_name": "Doe",
            "email": email,
            "phone_number": phone,
            "gender": "Female",
            "date_of_birth": "2000-01-01",
            "address": "123 Street"
        }
    })
}

pub fn access_of(session: &Value) -> String {
    session["access"].as_str().unwrap().to_string()
}

pub fn refresh_of(session: &Value) -> String {
    session["refresh"].as_str().unwrap().to_string()
}
