//! bcrypt credentials for registration and `SessionIssuer::authenticate`.

use tracing::warn;

use super::AuthError;

/// Work factor for newly hashed passwords.
pub const HASH_COST: u32 = 10;

/// Hash a new password. Empty passwords are refused.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    if password.is_empty() {
        return Err(AuthError::Validation("password must not be empty".into()));
    }
    bcrypt::hash(password, HASH_COST)
        .map_err(|e| AuthError::Internal(format!("hash password: {e}")))
}

/// Check `password` against a stored hash. An unreadable hash never matches.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match bcrypt::verify(password, stored_hash) {
        Ok(matched) => matched,
        Err(e) => {
            warn!(error = %e, "stored password hash is unreadable");
            false
        }
    }
}
