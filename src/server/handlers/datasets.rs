//! `/api/datasets` routes: dataset and dataset-record CRUD (contracts only —
//! fetch execution is out of scope).

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::db::datasets::{self, DatasetCreate, DatasetRecordCreate, DatasetUpdate};
use crate::error::{AgentError, AgentResult};
use crate::server::state::AppState;

pub async fn create(State(state): State<AppState>, Json(req): Json<DatasetCreate>) -> AgentResult<Json<datasets::DatasetResponse>> {
    Ok(Json(datasets::create(&state.pool, &req).await?))
}

pub async fn list(State(state): State<AppState>) -> AgentResult<Json<serde_json::Value>> {
    let data = datasets::list(&state.pool).await?;
    let total = data.len();
    Ok(Json(json!({"data": data, "total": total})))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> AgentResult<Json<datasets::DatasetResponse>> {
    datasets::get(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| AgentError::NotFound(format!("dataset {id} not found")))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<DatasetUpdate>,
) -> AgentResult<Json<datasets::DatasetResponse>> {
    datasets::update(&state.pool, id, &req)
        .await?
        .map(Json)
        .ok_or_else(|| AgentError::NotFound(format!("dataset {id} not found")))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> AgentResult<Json<serde_json::Value>> {
    let deleted = datasets::delete(&state.pool, id).await?;
    if !deleted {
        return Err(AgentError::NotFound(format!("dataset {id} not found")));
    }
    Ok(Json(json!({"message": "deleted"})))
}

#[derive(Debug, Deserialize)]
pub struct BulkCreateRecordsRequest {
    pub records: Vec<DatasetRecordCreate>,
}

pub async fn add_records(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<BulkCreateRecordsRequest>,
) -> AgentResult<Json<serde_json::Value>> {
    let inserted = datasets::add_records(&state.pool, id, &req.records).await?;
    Ok(Json(json!({"message": "records added", "count": inserted})))
}

pub async fn list_records(State(state): State<AppState>, Path(id): Path<Uuid>) -> AgentResult<Json<serde_json::Value>> {
    let data = datasets::list_records(&state.pool, id).await?;
    let total = data.len();
    Ok(Json(json!({"data": data, "total": total})))
}

pub async fn delete_record(
    State(state): State<AppState>,
    Path((dataset_id, record_id)): Path<(Uuid, Uuid)>,
) -> AgentResult<Json<serde_json::Value>> {
    let deleted = datasets::delete_record(&state.pool, dataset_id, record_id).await?;
    if !deleted {
        return Err(AgentError::NotFound(format!("record {record_id} not found in dataset {dataset_id}")));
    }
    Ok(Json(json!({"message": "deleted"})))
}
