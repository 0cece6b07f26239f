//! HTTP Surface (C10).
//!
//! Exposes agentd as a service: health check, the C4/C5 SSE run endpoints,
//! and thin CRUD over documents/datasets/settings/history/agents/workflows.

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::app_router;
pub use state::AppState;
