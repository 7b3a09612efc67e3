//! Session API endpoints.
//!
//! - POST `/login` - Exchange email and password for a session token
//! - POST `/refresh` - Exchange a valid bearer token for a fresh one
//! - POST `/logout` - Clear session cookies
//! - GET `/logout` - Clear session cookies and redirect to the login page
//! - GET `/csrf` - Issue a CSRF token

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{
        HeaderMap, StatusCode,
        header::{CACHE_CONTROL, EXPIRES, PRAGMA, SET_COOKIE},
    },
    response::{AppendHeaders, IntoResponse, Redirect},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ClientOrigin;
use super::error::{ApiError, ResultExt};
use crate::AppState;
use crate::auth::{
    CSRF_COOKIE_NAME, LOGIN_PAGE_PATH, SESSION_COOKIE_NAME, bearer_token, clear_cookie,
    csrf_cookie, generate_csrf_token, session_cookie,
};
use crate::credentials::{AdminRole, AuthError, MIN_PASSWORD_LENGTH};
use crate::forms::is_valid_email;
use crate::jwt::Identity;

const NO_CACHE: &str = "no-store, no-cache, must-revalidate";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout).get(logout_redirect))
        .route("/csrf", get(issue_csrf_token))
        .with_state(state)
}

#[derive(Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
struct UserInfo {
    id: String,
    email: String,
    role: AdminRole,
}

impl From<Identity> for UserInfo {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.user_id,
            email: identity.email,
            role: identity.role,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    success: bool,
    token: String,
    user: UserInfo,
    /// Seconds until the token expires
    expires_in: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    success: bool,
    token: String,
    expires_in: u64,
}

#[derive(Serialize)]
struct LogoutResponse {
    success: bool,
    message: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CsrfResponse {
    csrf_token: String,
}

fn validate_login(request: LoginRequest) -> Result<(String, String), ApiError> {
    let (Some(email), Some(password)) = (request.email, request.password) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };
    let email = email.trim().to_string();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email format"));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok((email, password))
}

/// Authenticate an admin and start a session.
///
/// Every attempt counts against the origin's rate limit, including malformed
/// ones, so the limit is checked before anything else.
async fn login(
    State(state): State<AppState>,
    ClientOrigin(origin): ClientOrigin,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.login_policy.allow(&origin) {
        warn!(origin = %origin, "Login rate limit exceeded");
        return Err(AuthError::RateLimited.into());
    }

    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let (email, password) = validate_login(request)?;

    // Argon2 verification is CPU-bound.
    let credentials = state.credentials.clone();
    let attempted_email = email.clone();
    let account = tokio::task::spawn_blocking(move || credentials.authenticate(&email, &password))
        .await
        .internal_err("Login task failed")?
        .map_err(|e| {
            warn!(origin = %origin, email = %attempted_email, "Failed login attempt");
            ApiError::from(e)
        })?;

    let identity = Identity::from(&account);
    let issued = state.tokens.issue(&identity)?;

    info!(user_id = %identity.user_id, origin = %origin, "Admin logged in");

    Ok((
        StatusCode::OK,
        AppendHeaders([
            (
                SET_COOKIE,
                session_cookie(&issued.token, issued.lifetime, state.secure_cookies),
            ),
            // A new CSRF token is fetched after login.
            (
                SET_COOKIE,
                clear_cookie(CSRF_COOKIE_NAME, state.secure_cookies),
            ),
            (CACHE_CONTROL, "no-store".to_string()),
        ]),
        Json(LoginResponse {
            success: true,
            token: issued.token,
            user: identity.into(),
            expires_in: issued.lifetime,
        }),
    ))
}

/// Issue a fresh token for the identity in a valid bearer token.
async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError::NoToken)?;
    let issued = state.tokens.refresh(token)?;

    Ok((
        StatusCode::OK,
        AppendHeaders([
            (
                SET_COOKIE,
                session_cookie(&issued.token, issued.lifetime, state.secure_cookies),
            ),
            (CACHE_CONTROL, "no-store".to_string()),
        ]),
        Json(RefreshResponse {
            success: true,
            token: issued.token,
            expires_in: issued.lifetime,
        }),
    ))
}

fn clear_session_headers(secure: bool) -> AppendHeaders<[(axum::http::HeaderName, String); 5]> {
    AppendHeaders([
        (SET_COOKIE, clear_cookie(SESSION_COOKIE_NAME, secure)),
        (SET_COOKIE, clear_cookie(CSRF_COOKIE_NAME, secure)),
        (CACHE_CONTROL, NO_CACHE.to_string()),
        (PRAGMA, "no-cache".to_string()),
        (EXPIRES, "0".to_string()),
    ])
}

/// Logout. Tokens are stateless, so this only clears the cookies; a copy of
/// the token held elsewhere stays valid until it expires.
async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        clear_session_headers(state.secure_cookies),
        Json(LogoutResponse {
            success: true,
            message: "Logged out successfully",
        }),
    )
}

async fn logout_redirect(State(state): State<AppState>) -> impl IntoResponse {
    (
        clear_session_headers(state.secure_cookies),
        Redirect::to(LOGIN_PAGE_PATH),
    )
}

/// Issue a new CSRF token in both the cookie and the body.
async fn issue_csrf_token(State(state): State<AppState>) -> impl IntoResponse {
    let token = generate_csrf_token();
    (
        StatusCode::OK,
        [
            (SET_COOKIE, csrf_cookie(&token, state.secure_cookies)),
            (CACHE_CONTROL, "no-store".to_string()),
        ],
        Json(CsrfResponse { csrf_token: token }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: Option<&str>, password: Option<&str>) -> LoginRequest {
        LoginRequest {
            email: email.map(str::to_string),
            password: password.map(str::to_string),
        }
    }

    #[test]
    fn test_validate_login() {
        let (email, _) = validate_login(request(Some(" admin@example.com "), Some("secret1"))).unwrap();
        assert_eq!(email, "admin@example.com");

        for bad in [
            request(None, Some("secret1")),
            request(Some("admin@example.com"), None),
            request(Some(""), Some("secret1")),
            request(Some("not-an-email"), Some("secret1")),
            request(Some("admin@example.com"), Some("12345")),
        ] {
            assert!(matches!(validate_login(bad), Err(ApiError::BadRequest(_))));
        }
    }
}
