use crate::error::{AppError, AppResult};

/// Hash a password for storage. Treated as an opaque one-way function.
pub fn hash(password: &str) -> AppResult<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("bcrypt hash failed: {e}")))
}

/// Compare a candidate password against a stored hash. A malformed
/// stored hash counts as a mismatch rather than an error.
pub fn verify(password: &str, stored_hash: &str) -> bool {
    bcrypt::verify(password, stored_hash).unwrap_or(false)
}
