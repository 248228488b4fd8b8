#![allow(dead_code)]

use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use axum::body::Body;
use axum::extract::connect_info::ConnectInfo;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

use yatube_api::app::auth::{AuthService, TokenSettings};
use yatube_api::app::rate_limiter::RateLimiter;
use yatube_api::config::decode_key_32;
use yatube_api::config::rate_limits::IpRateLimits;
use yatube_api::domain::group::{Group, NewGroup};
use yatube_api::domain::user::NewUser;
use yatube_api::infra::memory::MemoryStore;
use yatube_api::infra::store::{SharedStore, Store};
use yatube_api::AppState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

// "0123456789abcdef0123456789abcdef" (32 bytes)
const TEST_PASETO_ACCESS_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";
// "fedcba9876543210fedcba9876543210" (32 bytes)
const TEST_PASETO_REFRESH_KEY: &str = "ZmVkY2JhOTg3NjU0MzIxMGZlZGNiYTk4NzY1NDMyMTA=";
pub const TEST_ADMIN_TOKEN: &str = "test-admin-token-12345";
pub const DEFAULT_PASSWORD: &str = "testpassword123";

// ---------------------------------------------------------------------------
// TestApp: a fresh in-memory application per test
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn app() -> TestApp {
    TestApp::setup()
}

impl TestApp {
    fn setup() -> Self {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let state = AppState {
            store,
            rate_limiter: RateLimiter::in_memory(),
            ip_rate_limits: IpRateLimits::default(),
            tokens: TokenSettings {
                access_key: decode_key_32(TEST_PASETO_ACCESS_KEY).expect("bad access key"),
                refresh_key: decode_key_32(TEST_PASETO_REFRESH_KEY).expect("bad refresh key"),
                access_ttl_minutes: 15,
                refresh_ttl_days: 30,
            },
            admin_token: Some(TEST_ADMIN_TOKEN.to_string()),
        };

        let router = yatube_api::http::router(state.clone());

        TestApp { router, state }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let body = body.map(|body| serde_json::to_string(&body).unwrap());
        self.request_raw(method, path, body, headers).await
    }

    /// Sends `body` verbatim as JSON, which allows malformed payloads.
    pub async fn request_raw(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        // Inject ConnectInfo so the IP-rate-limit middleware can extract it.
        let mut request = request;
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 0))));

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(method, path, body, &headers).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::GET, path, None, token).await
    }

    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.send(Method::POST, path, Some(body), token).await
    }

    pub async fn put_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.send(Method::PUT, path, Some(body), token).await
    }

    pub async fn patch_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.send(Method::PATCH, path, Some(body), token).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::DELETE, path, None, token).await
    }

    /// POST with an admin token in the x-admin-token header.
    pub async fn post_admin(
        &self,
        path: &str,
        body: Value,
        admin_token: Option<&str>,
    ) -> TestResponse {
        let mut headers = vec![];
        if let Some(t) = admin_token {
            headers.push(("x-admin-token", t));
        }
        self.request(Method::POST, path, Some(body), &headers).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Create a user directly in the store and issue tokens for it.
    pub async fn create_user(&self, username: &str) -> TestUser {
        let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
        let hash = Argon2::default()
            .hash_password(DEFAULT_PASSWORD.as_bytes(), &salt)
            .expect("password hash failed")
            .to_string();

        let user = self
            .state
            .store
            .create_user(NewUser {
                username: username.to_string(),
                email: Some(format!("{}@example.com", username)),
                password_hash: hash,
            })
            .await
            .expect("insert test user failed");

        // Issue tokens directly (avoids IP rate-limiting)
        let auth_service = AuthService::new(self.state.store.clone(), self.state.tokens);
        let tokens = auth_service
            .issue_token_pair(user.id)
            .expect("issue token pair failed");

        TestUser {
            id: user.id,
            username: user.username,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }
    }

    pub async fn create_group(&self, slug: &str) -> Group {
        self.state
            .store
            .create_group(NewGroup {
                title: format!("Group {}", slug),
                slug: slug.to_string(),
                description: String::new(),
            })
            .await
            .expect("insert test group failed")
    }

    /// Create a post through the API and return its id.
    pub async fn create_post(&self, user: &TestUser, text: &str) -> i64 {
        let resp = self
            .post_json("/api/v1/posts/", json!({ "text": text }), Some(&user.access_token))
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "create post failed");
        resp.json()["id"].as_i64().expect("post id")
    }

    pub async fn create_comment(&self, user: &TestUser, post_id: i64, text: &str) -> i64 {
        let resp = self
            .post_json(
                &format!("/api/v1/posts/{}/comments/", post_id),
                json!({ "text": text }),
                Some(&user.access_token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "create comment failed");
        resp.json()["id"].as_i64().expect("comment id")
    }
}
