//! Adapters for the persistence ports in [`crate::domain::repositories`].

pub mod memory;
pub mod postgres;
