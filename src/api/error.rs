//! Shared error handling for API endpoints and middleware.
//!
//! Every error response in the crate goes through [`ApiError`], so a given
//! failure always has one status code and one body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::credentials::AuthError;
use crate::forms::ValidationError;
use crate::jwt::TokenError;

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn internal_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn internal_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::internal(msg, e))
    }
}

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed input
    BadRequest(String),
    /// Unknown email, inactive account or wrong password
    InvalidCredentials,
    /// Login attempts exhausted for this origin
    RateLimited,
    /// No usable bearer token
    NoToken,
    /// Token failed signature or expiry checks
    InvalidToken,
    /// Double-submit CSRF check failed
    CsrfRejected,
    Forbidden(String),
    TooManyRequests(String),
    /// Unexpected failure; details are logged, not returned
    Internal,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn too_many_requests(msg: impl Into<String>) -> Self {
        Self::TooManyRequests(msg.into())
    }

    pub fn internal(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials | ApiError::NoToken | ApiError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::RateLimited | ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::CsrfRejected | ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) | ApiError::Forbidden(msg) | ApiError::TooManyRequests(msg) => {
                msg
            }
            ApiError::InvalidCredentials => "Invalid credentials",
            ApiError::RateLimited => "Too many login attempts. Please try again later.",
            ApiError::NoToken => "No token provided",
            ApiError::InvalidToken => "Invalid token",
            ApiError::CsrfRejected => "Invalid CSRF token",
            ApiError::Internal => "Internal server error",
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::RateLimited => ApiError::RateLimited,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.0)
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        if e.is_invalid_token() {
            ApiError::InvalidToken
        } else {
            ApiError::internal("Token operation failed", e)
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
