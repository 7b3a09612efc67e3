//! Double-submit CSRF protection.
//!
//! The server hands out a random token in the `csrf-token` cookie. Pages (or
//! API clients) echo it in the `X-CSRF-Token` header; a cross-site request can
//! make the browser send the cookie but cannot read it to fill in the header.
//! Login and logout are exempt.

use axum::{
    extract::Request,
    http::{HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use tracing::warn;

use super::cookie::{CSRF_COOKIE_NAME, csrf_cookie, get_cookie};
use crate::api::ApiError;

/// Header that must echo the CSRF cookie.
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

const TOKEN_BYTES: usize = 32;
/// Unpadded base64 length of `TOKEN_BYTES`.
const TOKEN_LEN: usize = 43;

const EXEMPT_PATHS: [&str; 2] = ["/api/auth/login", "/api/auth/logout"];
const GUARDED_PREFIXES: [&str; 2] = ["/api/admin", "/api/auth"];

/// Why a request failed the CSRF check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfError {
    MissingCookie,
    MissingHeader,
    Malformed,
    Mismatch,
}

impl std::fmt::Display for CsrfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CsrfError::MissingCookie => write!(f, "CSRF cookie missing"),
            CsrfError::MissingHeader => write!(f, "CSRF header missing"),
            CsrfError::Malformed => write!(f, "CSRF token malformed"),
            CsrfError::Mismatch => write!(f, "CSRF header does not match cookie"),
        }
    }
}

impl std::error::Error for CsrfError {}

/// Generate a fresh random token.
pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Length-independent-time comparison over equal-length inputs.
fn tokens_match(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Whether a request must carry a valid CSRF token.
pub fn requires_csrf(method: &Method, path: &str) -> bool {
    let state_changing = matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    );
    if !state_changing || EXEMPT_PATHS.contains(&path) {
        return false;
    }
    GUARDED_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// Check that the header echoes the cookie.
pub fn validate_double_submit(headers: &HeaderMap) -> Result<(), CsrfError> {
    let cookie = get_cookie(headers, CSRF_COOKIE_NAME).ok_or(CsrfError::MissingCookie)?;
    let header = headers
        .get(CSRF_HEADER_NAME)
        .and_then(|v| v.to_str().ok())
        .ok_or(CsrfError::MissingHeader)?;

    if !is_well_formed(cookie) || !is_well_formed(header) {
        return Err(CsrfError::Malformed);
    }
    if !tokens_match(cookie, header) {
        return Err(CsrfError::Mismatch);
    }
    Ok(())
}

/// A `Set-Cookie` value for a new token when the request carries no usable
/// one.
pub fn ensure_csrf_cookie(headers: &HeaderMap, secure: bool) -> Option<String> {
    match get_cookie(headers, CSRF_COOKIE_NAME) {
        Some(existing) if is_well_formed(existing) => None,
        _ => Some(csrf_cookie(&generate_csrf_token(), secure)),
    }
}

/// Middleware enforcing the double-submit check on guarded routes.
pub async fn csrf_guard(request: Request, next: Next) -> Response {
    if !requires_csrf(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    match validate_double_submit(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            warn!(path = %request.uri().path(), reason = %e, "CSRF check failed");
            ApiError::CsrfRejected.into_response()
        }
    }
}
