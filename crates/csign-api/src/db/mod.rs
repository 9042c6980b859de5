//! # Database Persistence Layer
//!
//! Optional Postgres persistence via SQLx.
//!
//! When `DATABASE_URL` is set, forms, routes, applications, folders,
//! and documents are mirrored to Postgres: handlers commit to the
//! in-memory stores first and write through afterwards, and on
//! startup the stores are hydrated from the tables. When the variable
//! is absent the service runs in-memory only, which is the mode the
//! test suite uses.
//!
//! Complex fields (field schemas, step sequences, form data, decision
//! history) are stored as JSONB in the shape the engine serializes,
//! so a row read back is exactly the aggregate that was written.

pub mod applications;
pub mod documents;
pub mod folders;
pub mod forms;
pub mod routes;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration
/// fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set — running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}
