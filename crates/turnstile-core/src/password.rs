//! Password hashing for password fields.
//!
//! Values of password fields are stored only as Argon2id PHC strings; the
//! plaintext never reaches the storage layer.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::Error;

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Password(e.to_string()))
}

/// Verify a password against its stored hash.
///
/// Comparison is constant-time inside the argon2 crate.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, Error> {
    let parsed = PasswordHash::new(hash).map_err(|e| Error::Password(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Check whether a string already is a PHC hash string.
///
/// Used to avoid double-hashing when a stored document is written back
/// unchanged.
pub fn is_hashed(value: &str) -> bool {
    PasswordHash::new(value).is_ok()
}
