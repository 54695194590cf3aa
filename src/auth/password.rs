use bcrypt::{hash, verify, BcryptError};

/// Hashes `password` with bcrypt at the given cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String, BcryptError> {
    hash(password, cost)
}

/// Checks `password` against a stored bcrypt hash. A malformed hash is an
/// error rather than a mismatch.
pub fn verify_password(password: &str, hashed_password: &str) -> Result<bool, BcryptError> {
    verify(password, hashed_password)
}
