#![doc = "The `todoforge` library crate."]
#![doc = ""]
#![doc = "Domain model, use cases, repository adapters, authentication, routing"]
#![doc = "configuration and error handling of the TodoForge service. The binary"]
#![doc = "(`main.rs`) only wires configuration, state and the HTTP server together."]

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod models;
pub mod pagination;
pub mod persistence;
pub mod routes;
pub mod state;
pub mod usecases;

pub use crate::config::Config;
pub use crate::error::AppError;
pub use crate::state::AppState;
