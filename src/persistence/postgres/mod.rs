//! Postgres repositories over a shared `sqlx` pool.
//!
//! Queries are built at runtime, so compiling the crate needs no database.
//! The expected tables are in `sql/schema.sql`.

mod person;
mod query;
mod todo;
mod user;

use log::info;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Executor;

pub use person::PgPersonRepository;
pub use todo::PgTodoRepository;
pub use user::PgUserRepository;

const SCHEMA: &str = include_str!("../../../sql/schema.sql");

pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    info!("connected to Postgres (pool size {})", max_connections);
    Ok(pool)
}

/// Creates missing types, tables and indexes.
pub async fn apply_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    pool.execute(SCHEMA).await?;
    info!("database schema is up to date");
    Ok(())
}
