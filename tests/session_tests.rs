mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{ADMIN_EMAIL, ADMIN_ID, ADMIN_PASSWORD, CLIENT_IP, TestApp, get_with_bearer};
use pointe::credentials::AdminRole;
use pointe::session::{
    AuthTransport, HttpTransport, LoginReply, RefreshReply, SessionContext, SessionError,
    SessionEvent, TransportError,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tower::ServiceExt;
use url::Url;

/// Transport that calls the router in-process.
#[derive(Clone)]
struct RouterTransport {
    router: Router,
}

impl RouterTransport {
    async fn call<T: DeserializeOwned>(&self, request: Request<Body>) -> Result<T, TransportError> {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !status.is_success() {
            let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                message: body["error"].as_str().unwrap_or_default().to_string(),
            });
        }
        serde_json::from_slice(&bytes).map_err(|e| TransportError::Network(e.to_string()))
    }
}

impl AuthTransport for RouterTransport {
    async fn login(&self, email: &str, password: &str) -> Result<LoginReply, TransportError> {
        self.call(common::json_request(
            "POST",
            "/api/auth/login",
            CLIENT_IP,
            serde_json::json!({ "email": email, "password": password }),
        ))
        .await
    }

    async fn refresh(&self, token: &str) -> Result<RefreshReply, TransportError> {
        let csrf: serde_json::Value = self.call(common::get("/api/auth/csrf")).await?;
        let csrf = csrf["csrfToken"].as_str().unwrap_or_default().to_string();
        self.call(common::post_with_csrf("/api/auth/refresh", Some(token), &csrf))
            .await
    }

    async fn logout(&self, _token: Option<&str>) -> Result<(), TransportError> {
        let _: serde_json::Value = self
            .call(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/logout")
                    .header("x-forwarded-for", CLIENT_IP)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await?;
        Ok(())
    }
}

/// Logs in through the router but always fails to refresh.
struct RefreshRejected(RouterTransport);

impl AuthTransport for RefreshRejected {
    async fn login(&self, email: &str, password: &str) -> Result<LoginReply, TransportError> {
        self.0.login(email, password).await
    }

    async fn refresh(&self, _token: &str) -> Result<RefreshReply, TransportError> {
        Err(TransportError::Rejected {
            status: 401,
            message: "Invalid token".to_string(),
        })
    }

    async fn logout(&self, token: Option<&str>) -> Result<(), TransportError> {
        self.0.logout(token).await
    }
}

/// Holds each refresh until released.
struct GatedRefresh {
    inner: RouterTransport,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl AuthTransport for GatedRefresh {
    async fn login(&self, email: &str, password: &str) -> Result<LoginReply, TransportError> {
        self.inner.login(email, password).await
    }

    async fn refresh(&self, token: &str) -> Result<RefreshReply, TransportError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.refresh(token).await
    }

    async fn logout(&self, token: Option<&str>) -> Result<(), TransportError> {
        self.inner.logout(token).await
    }
}

/// Logs in through the router but cannot reach the server to refresh.
struct RefreshUnreachable(RouterTransport);

impl AuthTransport for RefreshUnreachable {
    async fn login(&self, email: &str, password: &str) -> Result<LoginReply, TransportError> {
        self.0.login(email, password).await
    }

    async fn refresh(&self, _token: &str) -> Result<RefreshReply, TransportError> {
        Err(TransportError::Network("connection refused".to_string()))
    }

    async fn logout(&self, token: Option<&str>) -> Result<(), TransportError> {
        self.0.logout(token).await
    }
}

fn gated(app: &TestApp) -> (GatedRefresh, Arc<Notify>, Arc<Notify>) {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let transport = GatedRefresh {
        inner: transport(app),
        entered: entered.clone(),
        release: release.clone(),
    };
    (transport, entered, release)
}

fn transport(app: &TestApp) -> RouterTransport {
    RouterTransport {
        router: app.router.clone(),
    }
}

#[tokio::test]
async fn test_login_holds_session() {
    let app = TestApp::new();
    let ctx = SessionContext::new(transport(&app));
    assert!(!ctx.is_authenticated());

    let user = ctx.login(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    assert_eq!(user.id, ADMIN_ID);
    assert_eq!(user.role, AdminRole::SuperAdmin);

    let session = ctx.session().unwrap();
    assert!(session.expires_at > chrono::Utc::now() + chrono::TimeDelta::days(6));

    let token = ctx.authorized_token().await.unwrap();
    assert_eq!(token, session.token);
    let response = app.send(get_with_bearer("/api/admin/me", &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_failed_login_leaves_no_session() {
    let app = TestApp::new();
    let ctx = SessionContext::new(transport(&app));

    let err = ctx.login(ADMIN_EMAIL, "incorrect").await.unwrap_err();
    match err {
        SessionError::Transport(e) => {
            assert!(e.is_unauthorized());
            assert_eq!(
                e,
                TransportError::Rejected {
                    status: 401,
                    message: "Invalid credentials".to_string()
                }
            );
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!ctx.is_authenticated());
    assert_eq!(ctx.authorized_token().await, Err(SessionError::NotLoggedIn));
}

#[tokio::test]
async fn test_token_is_refreshed_inside_margin() {
    let app = TestApp::new();
    // Margin longer than the token lifetime: every use refreshes.
    let ctx = SessionContext::with_refresh_margin(
        transport(&app),
        Duration::from_secs(30 * 24 * 60 * 60),
    );
    ctx.login(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();

    let token = ctx.authorized_token().await.unwrap();
    assert!(ctx.is_authenticated());
    let claims = app.state.tokens.verify(&token).unwrap();
    assert_eq!(claims.user_id, ADMIN_ID);
}

#[tokio::test]
async fn test_failed_refresh_drops_session() {
    let app = TestApp::new();
    let ctx = SessionContext::new(RefreshRejected(transport(&app)));
    ctx.login(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();

    assert_eq!(ctx.refresh().await, Err(SessionError::Expired));
    assert!(!ctx.is_authenticated());
    assert_eq!(ctx.refresh().await, Err(SessionError::NotLoggedIn));
}

#[tokio::test]
async fn test_logout_during_refresh_stays_logged_out() {
    let app = TestApp::new();
    let (transport, entered, release) = gated(&app);
    let ctx = Arc::new(SessionContext::new(transport));
    ctx.login(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();

    let pending = tokio::spawn({
        let ctx = ctx.clone();
        async move { ctx.refresh().await }
    });
    entered.notified().await;

    assert_eq!(ctx.logout().await, SessionEvent::RedirectToLogin("/admin/login"));
    release.notify_one();

    assert_eq!(pending.await.unwrap(), Err(SessionError::NotLoggedIn));
    assert!(!ctx.is_authenticated());
    assert_eq!(ctx.session(), None);
}

#[tokio::test]
async fn test_network_failure_keeps_session() {
    let app = TestApp::new();
    let ctx = SessionContext::new(RefreshUnreachable(transport(&app)));
    ctx.login(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    let before = ctx.session().unwrap();

    assert_eq!(
        ctx.refresh().await,
        Err(SessionError::Transport(TransportError::Network(
            "connection refused".to_string()
        )))
    );
    assert!(ctx.is_authenticated());
    assert_eq!(ctx.session(), Some(before));
}

#[tokio::test]
async fn test_logout_and_unauthorized_redirect_to_login() {
    let app = TestApp::new();
    let ctx = SessionContext::new(transport(&app));

    ctx.login(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    assert_eq!(ctx.logout().await, SessionEvent::RedirectToLogin("/admin/login"));
    assert!(!ctx.is_authenticated());

    ctx.login(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    assert_eq!(
        ctx.handle_unauthorized(),
        SessionEvent::RedirectToLogin("/admin/login")
    );
    assert!(!ctx.is_authenticated());
}

#[tokio::test]
async fn test_refresh_scheduler_stops_when_session_ends() {
    let app = TestApp::new();
    let ctx = Arc::new(SessionContext::with_refresh_margin(
        RefreshRejected(transport(&app)),
        Duration::from_secs(30 * 24 * 60 * 60),
    ));
    ctx.login(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();

    let handle = ctx.clone().spawn_refresh_scheduler();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("Scheduler did not stop")
        .unwrap();
    assert!(!ctx.is_authenticated());
}

#[tokio::test]
async fn test_http_transport_end_to_end() {
    let app = TestApp::from_config(pointe::ServerConfig {
        ip_extractor: None,
        ..common::test_config(None)
    });
    let (_handle, addr) = pointe::start_server(app.state.clone(), 0).await.unwrap();
    let base = Url::parse(&format!("http://{}", addr)).unwrap();

    let ctx = SessionContext::with_refresh_margin(
        HttpTransport::new(base.clone()),
        Duration::from_secs(30 * 24 * 60 * 60),
    );
    let user = ctx.login(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    assert_eq!(user.email, ADMIN_EMAIL);

    // Goes through the CSRF-protected refresh endpoint.
    let token = ctx.authorized_token().await.unwrap();

    let response = reqwest::Client::new()
        .get(base.join("/api/admin/me").unwrap())
        .header(header::AUTHORIZATION.as_str(), format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    assert_eq!(ctx.logout().await, SessionEvent::RedirectToLogin("/admin/login"));
    assert!(!ctx.is_authenticated());
}
