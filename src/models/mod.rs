//! Request and response bodies of the HTTP API.

pub mod todo;
pub mod user;

use serde::{Deserialize, Deserializer};

pub use todo::{
    CancelStaleQuery, ChangeStatusRequest, CreateTodoRequest, ProductivityQuery, TagRequest,
    TodoResponse, UpdateTodoRequest,
};
pub use user::{
    BlockSuspiciousRequest, DeactivateInactiveRequest, PersonResponse, UpdatePersonRequest,
    UserResponse,
};

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`). Use together with `#[serde(default)]`.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
