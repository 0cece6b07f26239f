//! Crate-wide error type.
//!
//! Corresponds to the error taxonomy in the design notes: configuration
//! errors fail a run before it starts, upstream errors surface inside the
//! SSE stream as an `error` event, and database errors bubble up from the
//! persistence layer (C9). Tool errors, retrieval errors, and workflow step
//! errors are deliberately *not* represented here — they are caught at
//! their own boundary and turned into textual output instead of propagating.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("upstream error: {0}")]
    Upstream(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

impl AgentError {
    pub fn status(&self) -> StatusCode {
        match self {
            AgentError::Config(_) | AgentError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AgentError::NotFound(_) => StatusCode::NOT_FOUND,
            AgentError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AgentError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
