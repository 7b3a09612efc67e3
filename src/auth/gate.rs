//! Route gate middleware.
//!
//! Each request is classified once into a [`RouteClass`]; each class has its
//! own handler. The gate holds no state of its own and does no I/O beyond
//! verifying the token signature.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::cookie::{SESSION_COOKIE_NAME, get_cookie};
use crate::api::ApiError;
use crate::jwt::{SessionClaims, TokenService};

/// Login page. Never gated.
pub const LOGIN_PAGE_PATH: &str = "/admin/login";

/// Internal header carrying the verified admin ID.
pub const USER_ID_HEADER: &str = "x-admin-user-id";
/// Internal header carrying the verified admin email.
pub const EMAIL_HEADER: &str = "x-admin-email";
/// Internal header carrying the verified admin role.
pub const ROLE_HEADER: &str = "x-admin-role";

const IDENTITY_HEADERS: [&str; 3] = [USER_ID_HEADER, EMAIL_HEADER, ROLE_HEADER];

/// How the gate treats a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Public pages and APIs
    Unprotected,
    /// The admin login page
    LoginPage,
    /// Browser navigation under `/admin`
    AdminPage,
    /// Programmatic access under `/api/admin`
    AdminApi,
}

impl RouteClass {
    pub fn classify(path: &str) -> Self {
        if is_under(path, LOGIN_PAGE_PATH) {
            RouteClass::LoginPage
        } else if is_under(path, "/admin") {
            RouteClass::AdminPage
        } else if is_under(path, "/api/admin") {
            RouteClass::AdminApi
        } else {
            RouteClass::Unprotected
        }
    }
}

/// `path` equals `prefix` or continues it with a new segment.
fn is_under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// State for the route gate.
#[derive(Clone)]
pub struct GateState {
    pub tokens: Arc<TokenService>,
}

/// Token from an `Authorization: Bearer <token>` header. Missing or malformed
/// headers yield `None`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Middleware applied to the whole app.
pub async fn route_gate(State(state): State<GateState>, mut request: Request, next: Next) -> Response {
    // Identity headers are only ever set by the gate itself.
    for name in IDENTITY_HEADERS {
        request.headers_mut().remove(name);
    }

    match RouteClass::classify(request.uri().path()) {
        RouteClass::Unprotected | RouteClass::LoginPage => next.run(request).await,
        RouteClass::AdminPage => gate_admin_page(&state, request, next).await,
        RouteClass::AdminApi => gate_admin_api(&state, request, next).await,
    }
}

/// Cookie first, bearer header second; any failure redirects to login.
async fn gate_admin_page(state: &GateState, mut request: Request, next: Next) -> Response {
    let token = get_cookie(request.headers(), SESSION_COOKIE_NAME)
        .or_else(|| bearer_token(request.headers()))
        .map(str::to_owned);

    let Some(token) = token else {
        return Redirect::temporary(LOGIN_PAGE_PATH).into_response();
    };

    let claims = match state.tokens.verify(&token) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(path = %request.uri().path(), error = %e, "Admin page token rejected");
            return Redirect::temporary(LOGIN_PAGE_PATH).into_response();
        }
    };

    if let Err(e) = inject_identity(request.headers_mut(), &claims) {
        return e.into_response();
    }
    next.run(request).await
}

/// Bearer header only; failures are 401 JSON.
async fn gate_admin_api(state: &GateState, mut request: Request, next: Next) -> Response {
    let Some(token) = bearer_token(request.headers()).map(str::to_owned) else {
        return ApiError::NoToken.into_response();
    };

    let claims = match state.tokens.verify(&token) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(path = %request.uri().path(), error = %e, "Admin API token rejected");
            return ApiError::InvalidToken.into_response();
        }
    };

    if let Err(e) = inject_identity(request.headers_mut(), &claims) {
        return e.into_response();
    }
    next.run(request).await
}

fn inject_identity(headers: &mut HeaderMap, claims: &SessionClaims) -> Result<(), ApiError> {
    let values = [
        (USER_ID_HEADER, claims.user_id.as_str()),
        (EMAIL_HEADER, claims.email.as_str()),
        (ROLE_HEADER, claims.role.as_str()),
    ];
    for (name, value) in values {
        let value = HeaderValue::from_str(value).map_err(|e| {
            ApiError::internal("Identity claim is not a valid header value", e)
        })?;
        headers.insert(name, value);
    }
    Ok(())
}
