//! Aggregates. Fields are private; mutation goes through methods that keep
//! each aggregate's invariants.

mod person;
mod todo;
mod user;

pub use person::{Person, PersonParts};
pub use todo::{Todo, TodoParts};
pub use user::{
    validate_username, Role, User, UserParts, UserStatus, MAX_USERNAME_LENGTH,
    MIN_USERNAME_LENGTH,
};
pub(crate) use user::USERNAME_REGEX;
