//! Immutable value objects.
//!
//! Each value object is built through a single fallible constructor that
//! normalises its input and enforces its invariants, so any instance in
//! hand is valid. Value objects compare by value.

mod date;
mod email;
mod password;
mod priority;
mod tag;
mod tax_id;
mod todo_description;
mod todo_status;
mod todo_title;

pub use date::Date;
pub use email::Email;
pub use password::{Password, MAX_PASSWORD_BYTES, MIN_PASSWORD_LENGTH};
pub use priority::Priority;
pub use tag::{normalize_tag, MAX_TAG_LENGTH};
pub use tax_id::{TaxId, TaxIdKind};
pub use todo_description::{TodoDescription, MAX_DESCRIPTION_LENGTH};
pub use todo_status::TodoStatus;
pub use todo_title::{TodoTitle, MAX_TITLE_LENGTH, MIN_TITLE_LENGTH};
