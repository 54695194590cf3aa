//! Domain failures.
//!
//! Every failure produced below the transport layer is a [`DomainError`].
//! Each variant belongs to one [`ErrorKind`] (which decides the HTTP status
//! at the boundary) and carries a stable machine tag returned by
//! [`DomainError::code`].

use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

use crate::domain::value_objects::TodoStatus;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unauthorized,
    Forbidden,
    InvalidTransition,
    PolicyViolation,
    Cancelled,
    Internal,
}

/// Failures raised by the persistence ports.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),
    #[error("repository failure: {0}")]
    Other(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".into()),
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23505") => {
                RepositoryError::DuplicateEntry(
                    db.constraint().unwrap_or("unique constraint").to_string(),
                )
            }
            other => RepositoryError::Other(other.to_string()),
        }
    }
}

/// Failures raised by the token service.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token has been revoked")]
    Revoked,
    #[error("token is not valid yet")]
    NotYetValid,
    #[error("expected a {expected} token but got a {actual} token")]
    WrongType {
        expected: &'static str,
        actual: String,
    },
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("token operation cancelled")]
    Cancelled,
}

impl TokenError {
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Expired => "EXPIRED_TOKEN",
            TokenError::Revoked => "REVOKED_TOKEN",
            TokenError::NotYetValid => "TOKEN_NOT_YET_VALID",
            TokenError::WrongType { .. } => "INVALID_TOKEN_TYPE",
            TokenError::Invalid(_) => "INVALID_TOKEN",
            TokenError::Signing(_) => "TOKEN_SIGNING_FAILED",
            TokenError::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{entity} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{message}")]
    Conflict { field: &'static str, message: String },

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("user account is not active")]
    UserNotActive,

    #[error("current password is incorrect")]
    IncorrectPassword,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: TodoStatus, to: TodoStatus },

    #[error("todo is already completed")]
    AlreadyCompleted,

    #[error("{message}")]
    PolicyViolation { code: &'static str, message: String },

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(field: &'static str, message: impl Into<String>) -> Self {
        DomainError::Conflict {
            field,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation { .. } => ErrorKind::Validation,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Conflict { .. } => ErrorKind::Conflict,
            DomainError::InvalidCredentials
            | DomainError::UserNotActive
            | DomainError::Unauthorized(_) => ErrorKind::Unauthorized,
            // A wrong current password is a bad request, not a failed login.
            DomainError::IncorrectPassword => ErrorKind::Validation,
            DomainError::Forbidden(_) => ErrorKind::Forbidden,
            DomainError::InvalidTransition { .. } | DomainError::AlreadyCompleted => {
                ErrorKind::InvalidTransition
            }
            DomainError::PolicyViolation { .. } => ErrorKind::PolicyViolation,
            DomainError::Token(TokenError::Cancelled) | DomainError::Cancelled => {
                ErrorKind::Cancelled
            }
            DomainError::Token(TokenError::Signing(_)) => ErrorKind::Internal,
            DomainError::Token(_) => ErrorKind::Unauthorized,
            DomainError::Repository(RepositoryError::NotFound(_)) => ErrorKind::NotFound,
            DomainError::Repository(RepositoryError::DuplicateEntry(_)) => ErrorKind::Conflict,
            DomainError::Repository(RepositoryError::Other(_)) | DomainError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Stable machine tag surfaced in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation { .. } => "VALIDATION_ERROR",
            DomainError::NotFound { .. } => "NOT_FOUND",
            DomainError::Conflict { .. } => "CONFLICT",
            DomainError::InvalidCredentials => "INVALID_CREDENTIALS",
            DomainError::UserNotActive => "USER_NOT_ACTIVE",
            DomainError::IncorrectPassword => "INCORRECT_PASSWORD",
            DomainError::Unauthorized(_) => "UNAUTHORIZED",
            DomainError::Forbidden(_) => "FORBIDDEN",
            DomainError::InvalidTransition { .. } => "INVALID_TRANSITION",
            DomainError::AlreadyCompleted => "ALREADY_COMPLETED",
            DomainError::PolicyViolation { code, .. } => *code,
            DomainError::Token(err) => err.code(),
            DomainError::Repository(RepositoryError::NotFound(_)) => "NOT_FOUND",
            DomainError::Repository(RepositoryError::DuplicateEntry(_)) => "CONFLICT",
            DomainError::Repository(RepositoryError::Other(_)) | DomainError::Internal(_) => {
                "INTERNAL_ERROR"
            }
            DomainError::Cancelled => "CANCELLED",
        }
    }

    /// Structured details for the error envelope, if any.
    pub fn details(&self) -> Option<Value> {
        match self {
            DomainError::Validation { field, .. } | DomainError::Conflict { field, .. } => {
                Some(json!({ "field": field }))
            }
            DomainError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            DomainError::InvalidTransition { from, to } => Some(json!({
                "from": from.as_str(),
                "to": to.as_str(),
            })),
            _ => None,
        }
    }
}

/// Maps repository failures onto domain failures at a use-case boundary.
pub trait RepoResultExt<T> {
    /// `NotFound` becomes [`DomainError::NotFound`] for `entity`/`id`,
    /// duplicates become conflicts, anything else stays a repository failure.
    fn or_not_found(self, entity: &'static str, id: impl fmt::Display) -> DomainResult<T>;
}

impl<T> RepoResultExt<T> for RepoResult<T> {
    fn or_not_found(self, entity: &'static str, id: impl fmt::Display) -> DomainResult<T> {
        self.map_err(|err| match err {
            RepositoryError::NotFound(_) => DomainError::not_found(entity, id),
            RepositoryError::DuplicateEntry(constraint) => {
                DomainError::conflict(entity, format!("{entity} already exists ({constraint})"))
            }
            other => DomainError::Repository(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_codes_line_up() {
        let err = DomainError::validation("title", "too short");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.details(), Some(json!({ "field": "title" })));

        let err = DomainError::InvalidTransition {
            from: TodoStatus::Completed,
            to: TodoStatus::Cancelled,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert_eq!(
            err.to_string(),
            "invalid status transition from completed to cancelled"
        );

        let err = DomainError::from(TokenError::Revoked);
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.code(), "REVOKED_TOKEN");

        assert_eq!(DomainError::IncorrectPassword.kind(), ErrorKind::Validation);
        assert_eq!(DomainError::IncorrectPassword.code(), "INCORRECT_PASSWORD");
    }

    #[test]
    fn repository_not_found_maps_to_domain_not_found() {
        let result: RepoResult<()> = Err(RepositoryError::NotFound("todo 7".into()));
        match result.or_not_found("todo", 7) {
            Err(DomainError::NotFound { entity, id }) => {
                assert_eq!(entity, "todo");
                assert_eq!(id, "7");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let result: RepoResult<()> = Err(RepositoryError::Other("boom".into()));
        let err = result.or_not_found("todo", 7).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
