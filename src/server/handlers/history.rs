//! `/api/history` routes — read access to the C6 audit sink.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::{AgentError, AgentResult};
use crate::history;
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}
fn default_limit() -> i64 {
    50
}

pub async fn list(State(state): State<AppState>, Query(q): Query<ListQuery>) -> AgentResult<Json<serde_json::Value>> {
    let (data, total) = history::list(&state.pool, q.page, q.limit).await?;
    Ok(Json(json!({"data": data, "total": total, "page": q.page, "limit": q.limit})))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> AgentResult<Json<history::HistoryItemDetail>> {
    history::get(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| AgentError::NotFound(format!("history entry {id} not found")))
}
