use std::sync::OnceLock;

use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::{OsRng, RngCore},
    },
};

use crate::error::AppError;

/// Hash a plaintext password using Argon2.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("failed to hash password: {e}")))
}

/// Check a plaintext password against a stored PHC hash.
///
/// Argon2 compares digests in constant time. An unparseable hash counts as
/// a mismatch so a corrupt row can never be logged into.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

static DUMMY_HASH: OnceLock<String> = OnceLock::new();

/// Hash with the same cost as a real one, checked when no account matches.
pub fn dummy_hash() -> &'static str {
    DUMMY_HASH.get_or_init(|| {
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        hash_password(&hex::encode(salt)).unwrap_or_default()
    })
}

/// Burn one Argon2 verification so a missing account costs as much as a
/// wrong password.
pub fn verify_dummy(password: &str) {
    let _ = verify_password(password, dummy_hash());
}
