//! Sequential workflow step execution.
//!
//! Each step gets a fresh child [`crate::agents::run`] at depth 0 (a
//! workflow step never shares sub-agent recursion budget with another
//! step), its SSE stream forwarded with step scoping, and a history record
//! written through C6. A step whose agent cannot be loaded emits
//! `step_error` and the workflow continues with an empty `prev_output`.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::json;
use sqlx::PgPool;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::agent::AgentConfig;
use crate::agents::{self, events::wrap_step_event, RunContext};
use crate::history::{self, HistoryRecord};
use crate::llms::LlmClient;

use super::{resolve_mappings, Workflow, WorkflowEvent};

async fn load_agent_config(pool: &PgPool, agent_id: Uuid) -> Result<AgentConfig, String> {
    let row: Option<(sqlx::types::Json<AgentConfig>,)> =
        sqlx::query_as("SELECT config FROM saved_agents WHERE id = $1")
            .bind(agent_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| e.to_string())?;
    row.map(|(sqlx::types::Json(config),)| config)
        .ok_or_else(|| format!("agent {agent_id} not found"))
}

/// Run a workflow to completion, sending formatted SSE frames on `out_tx` as
/// they are produced. Returns once `workflow_done` and the terminating
/// `[DONE]` marker have both been sent.
pub async fn run(
    pool: &PgPool,
    llm: &LlmClient,
    embed_model: &str,
    workflow: &Workflow,
    caller_variables: HashMap<String, String>,
    out_tx: mpsc::Sender<String>,
) {
    let mut step_outputs: HashMap<String, String> = HashMap::new();
    let mut prev_output = String::new();
    let total_steps = workflow.steps.len();

    for (index, step) in workflow.steps.iter().enumerate() {
        let started_at = Instant::now();

        let config = match load_agent_config(pool, step.agent_id).await {
            Ok(c) => c,
            Err(message) => {
                let _ = out_tx
                    .send(WorkflowEvent::StepError { step_id: step.id.clone(), index, message: message.clone() }.to_sse())
                    .await;
                history::record(
                    pool,
                    HistoryRecord {
                        method: "WORKFLOW_STEP".to_string(),
                        endpoint: format!("/api/workflows/{}/run", workflow.id),
                        model: String::new(),
                        duration_ms: started_at.elapsed().as_millis() as i64,
                        status: 500,
                        request_payload: json!({"step_id": step.id, "agent_id": step.agent_id}),
                        response_payload: json!({"text": "", "truncated": false, "error": message}),
                        workflow_id: Some(workflow.id),
                        workflow_name: Some(workflow.name.clone()),
                        step_index: Some(index as i32),
                    },
                )
                .await;
                step_outputs.insert(step.id.clone(), String::new());
                prev_output = String::new();
                continue;
            }
        };

        let _ = out_tx
            .send(WorkflowEvent::StepStart { step_id: step.id.clone(), index, agent_name: config.name.clone() }.to_sse())
            .await;

        let variables = resolve_mappings(&step.variable_mappings, &prev_output, &step_outputs, &caller_variables);

        let (events_tx, mut events_rx) = mpsc::channel(64);
        let run_ctx = RunContext { pool, llm, embed_model, depth: 0 };

        let run_fut = agents::run(run_ctx, &config, variables.clone(), true, events_tx);
        let forward_fut = async {
            while let Some(event) = events_rx.recv().await {
                let _ = out_tx.send(wrap_step_event(&step.id, index, &event)).await;
            }
        };
        let (outcome, _) = tokio::join!(run_fut, forward_fut);

        let _ = out_tx
            .send(WorkflowEvent::StepDone { step_id: step.id.clone(), index }.to_sse())
            .await;

        let (response_text, truncated) = outcome.history_text();
        history::record(
            pool,
            HistoryRecord {
                method: "WORKFLOW_STEP".to_string(),
                endpoint: format!("/api/workflows/{}/run", workflow.id),
                model: config.model.clone(),
                duration_ms: started_at.elapsed().as_millis() as i64,
                status: 200,
                request_payload: json!({
                    "step_id": step.id,
                    "agent_id": step.agent_id,
                    "agent_name": config.name,
                    "variables": variables,
                    "tools_used": outcome.tools_used(),
                    "iterations": outcome.iterations_used,
                }),
                response_payload: json!({"text": response_text, "truncated": truncated}),
                workflow_id: Some(workflow.id),
                workflow_name: Some(workflow.name.clone()),
                step_index: Some(index as i32),
            },
        )
        .await;

        prev_output = outcome.full_text.clone();
        step_outputs.insert(step.id.clone(), outcome.full_text);
    }

    let _ = out_tx
        .send(WorkflowEvent::WorkflowDone { total_steps, step_outputs }.to_sse())
        .await;
    let _ = out_tx.send(agents::events::done_marker().to_string()).await;
}
