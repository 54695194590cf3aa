use std::fmt;

use crate::auth::password::{hash_password, verify_password};
use crate::domain::errors::{DomainError, DomainResult};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// bcrypt only looks at the first 72 bytes of its input.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// A bcrypt-hashed password. The plaintext never outlives construction.
#[derive(Clone, PartialEq, Eq)]
pub struct Password {
    hash: String,
}

impl Password {
    /// Hashes `plain` with bcrypt's default cost.
    pub fn new(plain: &str) -> DomainResult<Self> {
        Self::with_cost(plain, bcrypt::DEFAULT_COST)
    }

    pub fn with_cost(plain: &str, cost: u32) -> DomainResult<Self> {
        if plain.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(DomainError::validation(
                "password",
                format!(
                    "password is too short: at least {} characters required",
                    MIN_PASSWORD_LENGTH
                ),
            ));
        }
        if plain.len() > MAX_PASSWORD_BYTES {
            return Err(DomainError::validation(
                "password",
                format!("password must not exceed {} bytes", MAX_PASSWORD_BYTES),
            ));
        }
        let hash = hash_password(plain, cost)
            .map_err(|e| DomainError::validation("password", e.to_string()))?;
        Ok(Self { hash })
    }

    /// Wraps an already hashed value loaded from storage.
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }

    pub fn matches(&self, plain: &str) -> bool {
        verify_password(plain, &self.hash).unwrap_or(false)
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}
