//! `/api/kb/*` routes: knowledge-base document CRUD (mirrors `main.py`'s
//! document routes field-for-field).

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::db::documents::{self, DocumentInput};
use crate::error::{AgentError, AgentResult};
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddDocumentsRequest {
    pub documents: Vec<DocumentInput>,
}

pub async fn add(State(state): State<AppState>, Json(req): Json<AddDocumentsRequest>) -> AgentResult<Json<serde_json::Value>> {
    let inserted = documents::add_documents(&state.pool, &req.documents).await?;
    Ok(Json(json!({"message": "documents added", "count": inserted})))
}

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
    let (data, total) = documents::list_documents(&state.pool, q.page, q.limit).await?;
    Ok(Json(json!({"data": data, "total": total, "page": q.page, "limit": q.limit})))
}

pub async fn delete_one(State(state): State<AppState>, Path(id): Path<Uuid>) -> AgentResult<Json<serde_json::Value>> {
    let deleted = documents::delete_document(&state.pool, id).await?;
    if !deleted {
        return Err(AgentError::NotFound(format!("document {id} not found")));
    }
    Ok(Json(json!({"message": "deleted"})))
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<Uuid>,
}

pub async fn bulk_delete(State(state): State<AppState>, Json(req): Json<BulkDeleteRequest>) -> AgentResult<Json<serde_json::Value>> {
    let deleted = documents::bulk_delete(&state.pool, &req.ids).await?;
    Ok(Json(json!({"deleted": deleted})))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub embedding: Vec<f32>,
    #[serde(default = "default_top_k")]
    pub top_k: i64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    pub sources: Option<Vec<String>>,
}

fn default_top_k() -> i64 {
    5
}
fn default_threshold() -> f64 {
    0.3
}

pub async fn search(State(state): State<AppState>, Json(req): Json<SearchRequest>) -> AgentResult<Json<serde_json::Value>> {
    let started = std::time::Instant::now();
    let results = documents::search_documents(&state.pool, &req.embedding, req.top_k, req.threshold, req.sources.as_deref()).await?;
    Ok(Json(json!({
        "results": results,
        "search_time_ms": started.elapsed().as_millis(),
    })))
}

pub async fn stats(State(state): State<AppState>) -> AgentResult<Json<documents::Stats>> {
    Ok(Json(documents::stats(&state.pool).await?))
}

pub async fn clear(State(state): State<AppState>) -> AgentResult<Json<serde_json::Value>> {
    let deleted = documents::clear_all(&state.pool).await?;
    Ok(Json(json!({"message": "cleared", "count": deleted})))
}
