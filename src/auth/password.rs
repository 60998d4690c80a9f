use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::AppError;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
}

/// Checks `password` against a stored bcrypt hash.
///
/// A stored hash that cannot be parsed is a server-side fault, not a wrong password.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    verify(password, password_hash)
        .map_err(|e| AppError::InternalServerError(format!("Failed to verify password: {}", e)))
}
