#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, Response, header},
};
use pointe::auth::{ClientIpHeader, IpExtractor};
use pointe::credentials::{AdminAccount, AdminRole};
use pointe::db::Database;
use pointe::password::hash_password;
use pointe::{AppState, ServerConfig, create_app};
use std::sync::OnceLock;
use std::time::Duration;
use tower::ServiceExt;

pub const JWT_SECRET: &[u8] = b"test-jwt-secret-at-least-32-bytes-long";
pub const ADMIN_ID: &str = "admin-1";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "correct";
pub const INACTIVE_EMAIL: &str = "former@example.com";
pub const CLIENT_IP: &str = "203.0.113.7";
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Hashing is slow; every test binary hashes the admin password once.
fn admin_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(ADMIN_PASSWORD).expect("Failed to hash password"))
}

pub fn admin_accounts() -> Vec<AdminAccount> {
    vec![
        AdminAccount {
            id: ADMIN_ID.to_string(),
            email: ADMIN_EMAIL.to_string(),
            password_hash: admin_hash().to_string(),
            role: AdminRole::SuperAdmin,
            is_active: true,
        },
        AdminAccount {
            id: "admin-2".to_string(),
            email: INACTIVE_EMAIL.to_string(),
            password_hash: admin_hash().to_string(),
            role: AdminRole::Admin,
            is_active: false,
        },
    ]
}

pub fn test_config(db: Option<Database>) -> ServerConfig {
    ServerConfig {
        jwt_secret: JWT_SECRET.to_vec(),
        token_lifetime: TOKEN_LIFETIME,
        admins: admin_accounts(),
        db,
        secure_cookies: false,
        ip_extractor: Some(IpExtractor::from(ClientIpHeader::XForwardedFor)),
        login_max_attempts: 5,
        login_window: Duration::from_secs(900),
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    /// App with no primary store configured.
    pub fn new() -> Self {
        Self::from_config(test_config(None))
    }

    pub async fn with_memory_db() -> Self {
        let db = Database::open(":memory:")
            .await
            .expect("Failed to open test database");
        Self::from_config(test_config(Some(db)))
    }

    pub fn from_config(config: ServerConfig) -> Self {
        let state = AppState::new(config).expect("Invalid test accounts");
        let router = create_app(state.clone());
        Self { state, router }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed")
    }

    /// Log in as the test admin and return the token.
    pub async fn login(&self) -> String {
        let response = self
            .send(json_request(
                "POST",
                "/api/auth/login",
                CLIENT_IP,
                serde_json::json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
            ))
            .await;
        assert!(response.status().is_success(), "Login failed: {}", response.status());
        let body = body_json(response).await;
        body["token"].as_str().expect("No token in login response").to_string()
    }

    /// Fetch a CSRF token from the API.
    pub async fn csrf_token(&self) -> String {
        let response = self.send(get("/api/auth/csrf")).await;
        let body = body_json(response).await;
        body["csrfToken"].as_str().expect("No CSRF token").to_string()
    }
}

pub fn json_request(method: &str, uri: &str, ip: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP)
        .body(Body::empty())
        .unwrap()
}

pub fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

/// POST with bearer token and a matching CSRF cookie and header.
pub fn post_with_csrf(uri: &str, token: Option<&str>, csrf: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP)
        .header(header::COOKIE, format!("csrf-token={}", csrf))
        .header("x-csrf-token", csrf);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body")
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("Body is not JSON")
}

pub fn set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// The `Set-Cookie` value for `name`, if any.
pub fn find_set_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    set_cookies(headers)
        .into_iter()
        .find(|c| c.starts_with(&format!("{}=", name)))
}

pub fn location(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
}
