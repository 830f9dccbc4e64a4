/// Password Hashing and Verification

use bcrypt::{hash, verify};

use crate::error::AppError;

/// Cost range bcrypt accepts
pub const MIN_HASH_COST: u32 = 4;
pub const MAX_HASH_COST: u32 = 31;

/// Hash a password using bcrypt at the given cost
///
/// # Errors
/// Returns an internal error if bcrypt hashing fails (e.g. cost out of range)
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its bcrypt hash
///
/// The plaintext is compared exactly as given; callers must not trim it.
/// Fails closed: a malformed hash or any bcrypt error counts as a mismatch.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match verify(password, password_hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!("Password verification error: {}", e);
            false
        }
    }
}
