//! Persistence for rundowns and their timelines.
//!
//! Storage is document-shaped: a Rundown aggregate is loaded and saved as a
//! whole, and the Segment/Part/Piece repositories operate through it. Two
//! backends implement the traits in [`repositories`]: [`memory::InMemoryStore`]
//! and [`pg::PgStore`].

use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod memory;
pub mod pg;
pub mod repositories;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the pool can reach the database.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations under `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
