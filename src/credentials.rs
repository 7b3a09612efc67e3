//! Administrator accounts and credential verification.
//!
//! The account list is fixed at startup. Lookup is by normalized email and
//! only active accounts can authenticate. Unknown email, inactive account and
//! wrong password all fail with the same [`AuthError::InvalidCredentials`].

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::password::{self, PasswordError};

/// Minimum accepted password length on login.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Administrator role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    Admin,
    SuperAdmin,
}

impl AdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminRole::Admin => "admin",
            AdminRole::SuperAdmin => "super_admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(AdminRole::Admin),
            "super_admin" => Some(AdminRole::SuperAdmin),
            _ => None,
        }
    }
}

/// A configured administrator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAccount {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub role: AdminRole,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Credential verification failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown email, inactive account or wrong password
    InvalidCredentials,
    /// Too many attempts from this client origin
    RateLimited,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::RateLimited => write!(f, "Too many login attempts"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Errors building a credential store from configuration.
#[derive(Debug)]
pub enum CredentialConfigError {
    DuplicateEmail(String),
    InvalidHash { email: String, source: PasswordError },
    Hashing(PasswordError),
}

impl std::fmt::Display for CredentialConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialConfigError::DuplicateEmail(email) => {
                write!(f, "Duplicate admin email: {}", email)
            }
            CredentialConfigError::InvalidHash { email, source } => {
                write!(f, "Invalid password hash for {}: {}", email, source)
            }
            CredentialConfigError::Hashing(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CredentialConfigError {}

/// Read-only administrator list.
pub struct CredentialStore {
    accounts: Vec<AdminAccount>,
    /// Verified against when no account matches so every lookup costs one hash.
    dummy_hash: String,
}

impl CredentialStore {
    /// Build the store, normalizing emails and rejecting duplicates or
    /// unparseable hashes up front.
    pub fn new(accounts: Vec<AdminAccount>) -> Result<Self, CredentialConfigError> {
        let mut normalized: Vec<AdminAccount> = Vec::with_capacity(accounts.len());
        for mut account in accounts {
            account.email = normalize_email(&account.email);
            if normalized.iter().any(|a| a.email == account.email) {
                return Err(CredentialConfigError::DuplicateEmail(account.email));
            }
            if let Err(source) = password::check_hash_format(&account.password_hash) {
                return Err(CredentialConfigError::InvalidHash {
                    email: account.email,
                    source,
                });
            }
            normalized.push(account);
        }

        let dummy_hash = password::hash_password("pointe-timing-placeholder")
            .map_err(CredentialConfigError::Hashing)?;

        Ok(Self {
            accounts: normalized,
            dummy_hash,
        })
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Find an active account by email (case-insensitive).
    pub fn find_active(&self, email: &str) -> Option<&AdminAccount> {
        let email = normalize_email(email);
        self.accounts
            .iter()
            .find(|a| a.is_active && a.email == email)
    }

    /// Verify an email/password pair.
    ///
    /// This is CPU-bound; async callers should run it on a blocking thread.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<AdminAccount, AuthError> {
        let Some(account) = self.find_active(email) else {
            let _ = password::verify_password(password, &self.dummy_hash);
            return Err(AuthError::InvalidCredentials);
        };

        match password::verify_password(password, &account.password_hash) {
            Ok(true) => Ok(account.clone()),
            Ok(false) => Err(AuthError::InvalidCredentials),
            Err(e) => {
                // Hashes are checked at startup, so this is unreachable in practice.
                error!(account = %account.id, error = %e, "Stored password hash rejected");
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}

/// Trim and lowercase an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str, email: &str, password: &str, active: bool) -> AdminAccount {
        AdminAccount {
            id: id.to_string(),
            email: email.to_string(),
            password_hash: password::hash_password(password).unwrap(),
            role: AdminRole::Admin,
            is_active: active,
        }
    }

    fn store() -> CredentialStore {
        CredentialStore::new(vec![
            account("1", "Admin@Example.com", "correct", true),
            account("2", "retired@example.com", "correct", false),
        ])
        .unwrap()
    }

    #[test]
    fn test_authenticate_success() {
        let store = store();
        let account = store.authenticate("admin@example.com", "correct").unwrap();
        assert_eq!(account.id, "1");
        assert_eq!(account.email, "admin@example.com");
    }

    #[test]
    fn test_email_is_case_insensitive_and_trimmed() {
        let store = store();
        assert!(store.authenticate("  ADMIN@example.COM ", "correct").is_ok());
    }

    #[test]
    fn test_failures_are_indistinguishable() {
        let store = store();
        let wrong_password = store.authenticate("admin@example.com", "incorrect");
        let unknown_email = store.authenticate("nobody@example.com", "correct");
        let inactive = store.authenticate("retired@example.com", "correct");

        assert_eq!(wrong_password.unwrap_err(), AuthError::InvalidCredentials);
        assert_eq!(unknown_email.unwrap_err(), AuthError::InvalidCredentials);
        assert_eq!(inactive.unwrap_err(), AuthError::InvalidCredentials);
    }

    #[test]
    fn test_duplicate_emails_rejected() {
        let result = CredentialStore::new(vec![
            account("1", "a@example.com", "pw1234", true),
            account("2", "A@EXAMPLE.COM", "pw5678", true),
        ]);
        assert!(matches!(
            result,
            Err(CredentialConfigError::DuplicateEmail(_))
        ));
    }

    #[test]
    fn test_invalid_hash_rejected() {
        let result = CredentialStore::new(vec![AdminAccount {
            id: "1".into(),
            email: "a@example.com".into(),
            password_hash: "plaintext".into(),
            role: AdminRole::SuperAdmin,
            is_active: true,
        }]);
        assert!(matches!(
            result,
            Err(CredentialConfigError::InvalidHash { .. })
        ));
    }

    #[test]
    fn test_role_deserialization() {
        let json = r#"{"id":"7","email":"x@example.com","passwordHash":"h","role":"super_admin"}"#;
        let account: AdminAccount = serde_json::from_str(json).unwrap();
        assert_eq!(account.role, AdminRole::SuperAdmin);
        assert!(account.is_active);
        assert_eq!(AdminRole::parse("admin"), Some(AdminRole::Admin));
        assert_eq!(AdminRole::parse("owner"), None);
    }
}
