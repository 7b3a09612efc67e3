//! Argon2id password hashing.
//!
//! Hashes are stored as PHC strings (`$argon2id$v=19$...`) so the parameters
//! travel with the hash and can be tuned without invalidating existing
//! accounts.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::RngCore;

/// Errors from hashing or parsing stored hashes.
#[derive(Debug)]
pub enum PasswordError {
    /// The stored hash is not a valid PHC string
    MalformedHash(argon2::password_hash::Error),
    /// Hashing failed
    Hashing(argon2::password_hash::Error),
}

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordError::MalformedHash(e) => write!(f, "Malformed password hash: {}", e),
            PasswordError::Hashing(e) => write!(f, "Failed to hash password: {}", e),
        }
    }
}

impl std::error::Error for PasswordError {}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let mut salt_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(PasswordError::Hashing)?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(PasswordError::Hashing)
}

/// Check that a stored hash parses as a PHC string.
pub fn check_hash_format(stored_hash: &str) -> Result<(), PasswordError> {
    PasswordHash::new(stored_hash)
        .map(|_| ())
        .map_err(PasswordError::MalformedHash)
}

/// Verify a password against a stored PHC hash.
///
/// Returns `Ok(false)` on mismatch. The comparison inside argon2 is constant
/// time; only a structurally broken hash is an error.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(stored_hash).map_err(PasswordError::MalformedHash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
