//! `/api/workflows` routes: workflow CRUD and the C5 SSE run entry point.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::db::workflows;
use crate::error::{AgentError, AgentResult};
use crate::server::state::AppState;
use crate::workflow::{self, WorkflowStep};

#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateWorkflowRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub steps: Option<Vec<WorkflowStep>>,
}

#[derive(Debug, Serialize)]
pub struct WorkflowListResponse {
    pub data: Vec<workflows::WorkflowRecord>,
    pub total: usize,
}

pub async fn create(State(state): State<AppState>, Json(req): Json<CreateWorkflowRequest>) -> AgentResult<Json<workflows::WorkflowRecord>> {
    let record = workflows::create(&state.pool, &req.name, &req.description, &req.steps).await?;
    Ok(Json(record))
}

pub async fn list(State(state): State<AppState>) -> AgentResult<Json<WorkflowListResponse>> {
    let data = workflows::list(&state.pool).await?;
    let total = data.len();
    Ok(Json(WorkflowListResponse { data, total }))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> AgentResult<Json<workflows::WorkflowRecord>> {
    workflows::get(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| AgentError::NotFound(format!("workflow {id} not found")))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateWorkflowRequest>,
) -> AgentResult<Json<workflows::WorkflowRecord>> {
    workflows::update(&state.pool, id, req.name.as_deref(), req.description.as_deref(), req.steps.as_deref())
        .await?
        .map(Json)
        .ok_or_else(|| AgentError::NotFound(format!("workflow {id} not found")))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> AgentResult<Json<serde_json::Value>> {
    let deleted = workflows::delete(&state.pool, id).await?;
    if !deleted {
        return Err(AgentError::NotFound(format!("workflow {id} not found")));
    }
    Ok(Json(json!({"message": "deleted"})))
}

#[derive(Debug, Deserialize)]
pub struct RunWorkflowRequest {
    #[serde(default)]
    pub input: HashMap<String, String>,
}

/// `POST /api/workflows/:id/run` — the C5 entry point, streaming the
/// sequence of `step_start`/`step_*`/`step_done`/`workflow_done` SSE frames.
pub async fn run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RunWorkflowRequest>,
) -> AgentResult<Response> {
    let runnable = workflows::load_runnable(&state.pool, id)
        .await?
        .ok_or_else(|| AgentError::NotFound(format!("workflow {id} not found")))?;

    let pool = state.pool.clone();
    let llm = state.llm.clone();
    let embed_model = state.embed_model.clone();
    let caller_variables = req.input;

    let (out_tx, out_rx) = mpsc::channel::<String>(64);

    tokio::spawn(async move {
        workflow::run(&pool, &llm, &embed_model, &runnable, caller_variables, out_tx).await;
    });

    let stream = ReceiverStream::new(out_rx).map(|frame| Ok::<_, std::io::Error>(frame));
    let body = Body::from_stream(stream);

    Ok((
        [
            ("content-type", "text/event-stream"),
            ("cache-control", "no-cache"),
        ],
        body,
    )
        .into_response())
}
