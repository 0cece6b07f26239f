//! `/api/agents` routes: saved-agent CRUD and the C4 SSE run entry point.

use std::collections::HashMap;
use std::time::Instant;

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

use crate::agent::AgentConfig;
use crate::agents::{self, events::AgentEvent, RunContext};
use crate::db::saved_agents;
use crate::error::{AgentError, AgentResult};
use crate::history::{self, HistoryRecord};
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub config: AgentConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateAgentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub config: Option<AgentConfig>,
}

#[derive(Debug, Serialize)]
pub struct AgentListResponse {
    pub data: Vec<saved_agents::AgentRecord>,
    pub total: usize,
}

pub async fn create(State(state): State<AppState>, Json(req): Json<CreateAgentRequest>) -> AgentResult<Json<saved_agents::AgentRecord>> {
    let record = saved_agents::create(&state.pool, &req.name, &req.description, &req.config).await?;
    Ok(Json(record))
}

pub async fn list(State(state): State<AppState>) -> AgentResult<Json<AgentListResponse>> {
    let data = saved_agents::list(&state.pool).await?;
    let total = data.len();
    Ok(Json(AgentListResponse { data, total }))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> AgentResult<Json<saved_agents::AgentRecord>> {
    saved_agents::get(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| AgentError::NotFound(format!("agent {id} not found")))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAgentRequest>,
) -> AgentResult<Json<saved_agents::AgentRecord>> {
    saved_agents::update(&state.pool, id, req.name.as_deref(), req.description.as_deref(), req.config.as_ref())
        .await?
        .map(Json)
        .ok_or_else(|| AgentError::NotFound(format!("agent {id} not found")))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> AgentResult<Json<serde_json::Value>> {
    let deleted = saved_agents::delete(&state.pool, id).await?;
    if !deleted {
        return Err(AgentError::NotFound(format!("agent {id} not found")));
    }
    Ok(Json(json!({"message": "deleted"})))
}

pub async fn tools() -> Json<serde_json::Value> {
    Json(json!({ "tools": crate::tools::all_schemas().into_iter().map(|s| json!({
        "name": s.function.name,
        "description": s.function.description,
    })).collect::<Vec<_>>() }))
}

#[derive(Debug, Deserialize)]
pub struct RunAgentRequest {
    #[serde(default)]
    pub variables: HashMap<String, String>,
    pub stream: Option<bool>,
}

/// `POST /api/agents/:id/run` — the C4 entry point. Streams SSE frames back
/// as the executor produces them; validates the config up front so
/// configuration errors fail fast with no history row written.
pub async fn run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RunAgentRequest>,
) -> AgentResult<Response> {
    let record = saved_agents::get(&state.pool, id)
        .await?
        .ok_or_else(|| AgentError::NotFound(format!("agent {id} not found")))?;

    record.config.validate().map_err(AgentError::Config)?;

    let config = record.config;
    let stream_flag = req.stream.unwrap_or(true);
    let variables = req.variables;
    let pool = state.pool.clone();
    let llm = state.llm.clone();
    let embed_model = state.embed_model.clone();

    let (out_tx, out_rx) = mpsc::channel::<String>(64);

    tokio::spawn(async move {
        let started_at = Instant::now();
        let (events_tx, mut events_rx) = mpsc::channel::<AgentEvent>(64);

        let run_ctx = RunContext { pool: &pool, llm: &llm, embed_model: &embed_model, depth: 0 };
        let run_fut = agents::run(run_ctx, &config, variables.clone(), stream_flag, events_tx);
        let forward_fut = async {
            while let Some(event) = events_rx.recv().await {
                let _ = out_tx.send(event.to_sse()).await;
            }
        };
        let (outcome, _) = tokio::join!(run_fut, forward_fut);
        let _ = out_tx.send(agents::events::done_marker().to_string()).await;

        let (response_text, truncated) = outcome.history_text();
        history::record(
            &pool,
            HistoryRecord {
                method: "POST".to_string(),
                endpoint: format!("/api/agents/{id}/run"),
                model: config.model.clone(),
                duration_ms: started_at.elapsed().as_millis() as i64,
                status: 200,
                request_payload: json!({
                    "agent_id": id,
                    "variables": variables,
                    "tools_used": outcome.tools_used(),
                    "iterations": outcome.iterations_used,
                    "rag_used": outcome.rag_used,
                }),
                response_payload: json!({"text": response_text, "truncated": truncated}),
                workflow_id: None,
                workflow_name: None,
                step_index: None,
            },
        )
        .await;
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
