//! Shared application state for the HTTP surface.

use sqlx::PgPool;

use crate::llms::LlmClient;

/// Cheaply cloned per request — `PgPool` and `LlmClient` are both `Arc`-backed
/// internally.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub llm: LlmClient,
    pub embed_model: String,
}
