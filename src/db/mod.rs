//! Persistence Layer (C9) — direct `sqlx` access to Postgres, no ORM.

pub mod datasets;
pub mod documents;
pub mod migrations;
pub mod saved_agents;
pub mod workflows;

pub use migrations::migrate;

/// Connects to `AGENTD_TEST_DATABASE_URL` and runs migrations, for CRUD tests
/// that need a live Postgres+pgvector instance. Returns `None` (skip, don't
/// fail) when the variable is unset, since this crate has no in-memory
/// Postgres stand-in.
#[cfg(test)]
pub(crate) async fn test_pool() -> Option<sqlx::PgPool> {
    let url = std::env::var("AGENTD_TEST_DATABASE_URL").ok()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("AGENTD_TEST_DATABASE_URL set but connection failed");
    migrate(&pool).await.expect("test schema migration failed");
    Some(pool)
}
