mod admin;
mod error;
mod storage;
mod submissions;
mod tokens;

use std::convert::Infallible;

use axum::{Router, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use crate::AppState;
use crate::auth::extract_client_ip;

pub use error::{ApiError, ResultExt};

/// Origin key used when no client address can be determined.
const UNKNOWN_ORIGIN: &str = "unknown";

/// Create the API router.
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .nest("/auth", tokens::router(state.clone()))
        .nest("/admin", admin::router(state.clone()))
        .merge(submissions::router(state.clone()))
        .merge(storage::router(state))
}

/// Client origin for login rate limiting.
///
/// Requests with no usable address share the `unknown` bucket rather than
/// being refused.
pub struct ClientOrigin(pub String);

impl FromRequestParts<AppState> for ClientOrigin {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match extract_client_ip(parts, state.ip_extractor.as_ref()) {
            Ok(ip) => Ok(ClientOrigin(ip)),
            Err(reason) => {
                warn!(reason, "Unable to determine client IP, using shared origin");
                Ok(ClientOrigin(UNKNOWN_ORIGIN.to_string()))
            }
        }
    }
}
