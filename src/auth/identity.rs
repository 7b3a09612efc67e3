//! Extractor for the identity the route gate injected.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::gate::{EMAIL_HEADER, ROLE_HEADER, USER_ID_HEADER};
use crate::api::ApiError;
use crate::credentials::AdminRole;
use crate::jwt::Identity;

/// Verified admin identity. Only meaningful on routes behind the gate; the
/// gate strips these headers from inbound requests before setting them.
#[derive(Debug, Clone)]
pub struct AdminIdentity(pub Identity);

impl<S> FromRequestParts<S> for AdminIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };

        let (Some(user_id), Some(email), Some(role)) = (
            header(USER_ID_HEADER),
            header(EMAIL_HEADER),
            header(ROLE_HEADER).as_deref().and_then(AdminRole::parse),
        ) else {
            return Err(ApiError::internal(
                "Identity headers missing",
                parts.uri.path(),
            ));
        };

        Ok(AdminIdentity(Identity {
            user_id,
            email,
            role,
        }))
    }
}
