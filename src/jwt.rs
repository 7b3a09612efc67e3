//! Session token issuance, verification and refresh.
//!
//! Tokens are HS256 JWTs carrying the admin identity plus `iat`/`exp` in Unix
//! seconds. The server keeps no record of issued tokens: a token is valid iff
//! its signature verifies and `now < exp`.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::credentials::{AdminAccount, AdminRole};

/// Default session token lifetime: 7 days
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 7 * 24 * 60 * 60;

/// Longest accepted token lifetime: 365 days
pub const MAX_TOKEN_LIFETIME_SECS: u64 = 365 * 24 * 60 * 60;

/// The identity a token asserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub role: AdminRole,
}

impl From<&AdminAccount> for Identity {
    fn from(account: &AdminAccount) -> Self {
        Self {
            user_id: account.id.clone(),
            email: account.email.clone(),
            role: account.role,
        }
    }
}

/// JWT claims for a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    /// Admin account ID
    pub user_id: String,
    /// Normalized email
    pub email: String,
    /// Admin role
    pub role: AdminRole,
    /// Issued at (Unix timestamp)
    #[serde(rename = "iat")]
    pub issued_at: u64,
    /// Expiration time (Unix timestamp)
    #[serde(rename = "exp")]
    pub expires_at: u64,
}

impl SessionClaims {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Result of issuing a token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The signed JWT
    pub token: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token lifetime in seconds
    pub lifetime: u64,
}

/// Signs and verifies session tokens with a process-wide secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime_secs: u64,
}

impl TokenService {
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            lifetime_secs: lifetime.as_secs(),
        }
    }

    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime_secs
    }

    /// Issue a token for the given identity, valid from now.
    pub fn issue(&self, identity: &Identity) -> Result<IssuedToken, TokenError> {
        self.issue_at(identity, unix_now()?)
    }

    /// Issue a token as if the clock read `now`.
    pub fn issue_at(&self, identity: &Identity, now: u64) -> Result<IssuedToken, TokenError> {
        let expires_at = now
            .checked_add(self.lifetime_secs)
            .ok_or(TokenError::ExpiryOverflow)?;
        let claims = SessionClaims {
            user_id: identity.user_id.clone(),
            email: identity.email.clone(),
            role: identity.role,
            issued_at: now,
            expires_at,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(TokenError::Encoding)?;

        Ok(IssuedToken {
            token,
            issued_at: now,
            expires_at,
            lifetime: self.lifetime_secs,
        })
    }

    /// Verify signature and expiry against the wall clock.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.verify_at(token, unix_now()?)
    }

    /// Verify signature and expiry as if the clock read `now`.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<SessionClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // Expiry is checked below against the supplied clock.
        validation.validate_exp = false;

        let token_data =
            jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation)
                .map_err(TokenError::Decoding)?;

        if now >= token_data.claims.expires_at {
            return Err(TokenError::Expired);
        }

        Ok(token_data.claims)
    }

    /// Re-sign the claims of a valid token with a fresh expiry.
    ///
    /// Only the identity is carried over; nothing is re-authenticated.
    pub fn refresh(&self, token: &str) -> Result<IssuedToken, TokenError> {
        let now = unix_now()?;
        let claims = self.verify_at(token, now)?;
        self.issue_at(&claims.identity(), now)
    }
}

/// Errors that can occur during token operations.
#[derive(Debug)]
pub enum TokenError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Malformed token or bad signature
    Decoding(jsonwebtoken::errors::Error),
    /// Signature is fine but `exp` has passed
    Expired,
    /// System time error
    TimeError,
    /// `iat + lifetime` does not fit in a timestamp
    ExpiryOverflow,
}

impl TokenError {
    /// Whether the presented token is at fault (as opposed to the server).
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, TokenError::Decoding(_) | TokenError::Expired)
    }
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            TokenError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            TokenError::Expired => write!(f, "Token expired"),
            TokenError::TimeError => write!(f, "System time error"),
            TokenError::ExpiryOverflow => write!(f, "Token expiry out of range"),
        }
    }
}

impl std::error::Error for TokenError {}

fn unix_now() -> Result<u64, TokenError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| TokenError::TimeError)?
        .as_secs())
}

/// Parse a lifetime such as `7d`, `12h`, `30m`, `45s` or a bare number of
/// seconds.
pub fn parse_lifetime(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Token lifetime cannot be empty".to_string());
    }

    let (digits, multiplier) = match s.chars().last() {
        Some('d') => (&s[..s.len() - 1], 24 * 60 * 60),
        Some('h') => (&s[..s.len() - 1], 60 * 60),
        Some('m') => (&s[..s.len() - 1], 60),
        Some('s') => (&s[..s.len() - 1], 1),
        _ => (s, 1),
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("Invalid token lifetime: {}", s))?;
    if value == 0 {
        return Err("Token lifetime must be positive".to_string());
    }

    value
        .checked_mul(multiplier)
        .filter(|secs| *secs <= MAX_TOKEN_LIFETIME_SECS)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("Token lifetime too large: {} (max 365d)", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            user_id: "admin-1".to_string(),
            email: "admin@example.com".to_string(),
            role: AdminRole::Admin,
        }
    }

    fn service() -> TokenService {
        TokenService::new(
            b"test-secret-key-for-testing",
            Duration::from_secs(DEFAULT_TOKEN_LIFETIME_SECS),
        )
    }

    #[test]
    fn test_issue_and_verify() {
        let service = service();
        let issued = service.issue(&identity()).unwrap();

        assert_eq!(issued.lifetime, DEFAULT_TOKEN_LIFETIME_SECS);
        assert_eq!(issued.expires_at - issued.issued_at, DEFAULT_TOKEN_LIFETIME_SECS);

        let claims = service.verify(&issued.token).unwrap();
        assert_eq!(claims.identity(), identity());
        assert!(claims.issued_at < claims.expires_at);
    }

    #[test]
    fn test_issue_is_deterministic() {
        let service = service();
        let a = service.issue_at(&identity(), 1_700_000_000).unwrap();
        let b = service.issue_at(&identity(), 1_700_000_000).unwrap();
        assert_eq!(a.token, b.token);
    }

    #[test]
    fn test_super_admin_role_in_token() {
        let service = service();
        let mut id = identity();
        id.role = AdminRole::SuperAdmin;

        let issued = service.issue(&id).unwrap();
        let claims = service.verify(&issued.token).unwrap();
        assert_eq!(claims.role, AdminRole::SuperAdmin);
    }

    #[test]
    fn test_invalid_token() {
        let service = service();
        let result = service.verify("invalid-token");
        assert!(matches!(result, Err(TokenError::Decoding(_))));
        assert!(result.unwrap_err().is_invalid_token());
    }

    #[test]
    fn test_wrong_secret() {
        let other = TokenService::new(b"secret-2", Duration::from_secs(60));
        let issued = other.issue(&identity()).unwrap();
        assert!(service().verify(&issued.token).is_err());
    }

    #[test]
    fn test_expired_token() {
        let secret = b"test-secret";
        let encoding_key = EncodingKey::from_secret(secret);
        let now = unix_now().unwrap();

        // Correctly signed, exp in the past
        let claims = SessionClaims {
            user_id: "admin-1".to_string(),
            email: "admin@example.com".to_string(),
            role: AdminRole::Admin,
            issued_at: now - 100,
            expires_at: now - 50,
        };
        let token = jsonwebtoken::encode(&Header::default(), &claims, &encoding_key).unwrap();

        let service = TokenService::new(secret, Duration::from_secs(60));
        assert!(matches!(service.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let service = TokenService::new(b"secret", Duration::from_secs(10));
        let issued = service.issue_at(&identity(), 1_000).unwrap();

        assert!(service.verify_at(&issued.token, 1_009).is_ok());
        assert!(matches!(
            service.verify_at(&issued.token, 1_010),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_refresh_keeps_identity() {
        let service = service();
        let now = unix_now().unwrap();
        let original = service.issue_at(&identity(), now - 3600).unwrap();

        let refreshed = service.refresh(&original.token).unwrap();
        let claims = service.verify(&refreshed.token).unwrap();

        assert_eq!(claims.identity(), identity());
        assert!(refreshed.expires_at > original.expires_at);
    }

    #[test]
    fn test_refresh_rejects_expired_and_garbage() {
        let service = TokenService::new(b"secret", Duration::from_secs(10));
        let stale = service.issue_at(&identity(), 1_000).unwrap();

        assert!(matches!(
            service.refresh(&stale.token),
            Err(TokenError::Expired)
        ));
        assert!(service.refresh("not.a.token").is_err());
    }

    #[test]
    fn test_parse_lifetime() {
        assert_eq!(
            parse_lifetime("7d").unwrap(),
            Duration::from_secs(DEFAULT_TOKEN_LIFETIME_SECS)
        );
        assert_eq!(parse_lifetime("12h").unwrap(), Duration::from_secs(43_200));
        assert_eq!(parse_lifetime("30m").unwrap(), Duration::from_secs(1_800));
        assert_eq!(parse_lifetime("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_lifetime("3600").unwrap(), Duration::from_secs(3_600));
        assert!(parse_lifetime("").is_err());
        assert!(parse_lifetime("0d").is_err());
        assert!(parse_lifetime("seven days").is_err());
        assert!(parse_lifetime("-1h").is_err());
    }

    #[test]
    fn test_parse_lifetime_rejects_oversized() {
        assert_eq!(
            parse_lifetime("365d").unwrap(),
            Duration::from_secs(MAX_TOKEN_LIFETIME_SECS)
        );
        assert!(parse_lifetime("366d").is_err());
        assert!(parse_lifetime("18446744073709551000").is_err());
        assert!(parse_lifetime("18446744073709551000d").is_err());
    }

    #[test]
    fn test_issue_with_oversized_lifetime_fails_cleanly() {
        let service = TokenService::new(
            b"secret",
            Duration::from_secs(18_446_744_073_709_551_000),
        );

        let result = service.issue_at(&identity(), 1_700_000_000);
        assert!(matches!(result, Err(TokenError::ExpiryOverflow)));
        assert!(!result.unwrap_err().is_invalid_token());
        assert!(service.issue(&identity()).is_err());
    }
}
