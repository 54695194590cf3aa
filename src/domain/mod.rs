//! Domain model: value objects, entities, query model, repository ports and
//! domain services. Nothing in here knows about HTTP.

pub mod entities;
pub mod errors;
pub mod query;
pub mod repositories;
pub mod services;
pub mod statistics;
pub mod value_objects;

pub use errors::{DomainError, DomainResult, ErrorKind, RepoResult, RepositoryError, TokenError};
