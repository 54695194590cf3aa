//! Orchestration between the HTTP handlers and the domain.
//!
//! Use cases take already-authenticated user ids, build value objects from
//! request DTOs, enforce ownership and policy through the domain services,
//! and persist through the repository ports.

pub mod auth;
pub mod person;
pub mod todo;

pub use auth::AuthUseCases;
pub use person::PersonUseCases;
pub use todo::TodoUseCases;

use crate::domain::{DomainError, RepositoryError};

/// Turns a uniqueness failure into a conflict on the field the constraint
/// guards. Other repository failures pass through unchanged.
pub(crate) fn conflict_from(error: RepositoryError) -> DomainError {
    match error {
        RepositoryError::DuplicateEntry(constraint) => {
            let (field, message) = match constraint.as_str() {
                "users_username_key" => ("username", "username is already taken"),
                "users_person_id_key" => ("person_id", "person already has a user"),
                "people_email_key" => ("email", "email is already registered"),
                "people_tax_id_key" => ("tax_id", "tax id is already registered"),
                _ => ("record", "record already exists"),
            };
            DomainError::conflict(field, message)
        }
        other => DomainError::Repository(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;

    #[test]
    fn test_conflict_from_names_the_field() {
        let err = conflict_from(RepositoryError::DuplicateEntry("people_email_key".into()));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.details(), Some(serde_json::json!({ "field": "email" })));

        let err = conflict_from(RepositoryError::Other("boom".into()));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
