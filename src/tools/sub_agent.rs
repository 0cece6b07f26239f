//! `sub_agent` — delegate to another saved agent as a sub-task.
//!
//! Corresponds to `kb-service/tools/sub_agent.py`. The actual execution is
//! performed by [`ToolContext::run_sub_agent`], supplied by the executor
//! that owns this call, so this module never imports `crate::agents`
//! directly (it would otherwise be a dependency cycle: executor -> tools ->
//! executor).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use super::{AgentTool, ToolContext};
use crate::llms::ToolSchema;

pub struct SubAgentTool;

const MAX_DEPTH: u32 = 3;

#[derive(Deserialize, Default)]
struct Args {
    agent_id: Option<Uuid>,
    agent_name: Option<String>,
    #[serde(default)]
    variables: HashMap<String, String>,
}

#[async_trait]
impl AgentTool for SubAgentTool {
    fn name(&self) -> &'static str {
        "sub_agent"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "sub_agent",
            "Run another saved agent as a sub-task. Use this to delegate specialized work to \
             other agents, enabling multi-agent collaboration. The sub-agent runs to completion \
             and returns its output.",
            json!({
                "type": "object",
                "properties": {
                    "agent_id": {
                        "type": "string",
                        "description": "UUID of the agent to run"
                    },
                    "agent_name": {
                        "type": "string",
                        "description": "Name of the agent to run (used if agent_id not provided, matches by name)"
                    },
                    "variables": {
                        "type": "object",
                        "description": "Variable values to pass to the sub-agent (key-value pairs)",
                        "additionalProperties": {"type": "string"}
                    }
                },
                "required": []
            }),
        )
    }

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> String {
        if ctx.depth >= MAX_DEPTH {
            return format!(
                "Error: Maximum sub-agent nesting depth ({MAX_DEPTH}) reached. Cannot call more sub-agents."
            );
        }

        let args: Args = serde_json::from_value(args).unwrap_or_default();

        let agent_id = match resolve_agent_id(ctx, &args).await {
            Ok(Some(id)) => id,
            Ok(None) => return list_available_agents(ctx).await,
            Err(msg) => return msg,
        };

        match (ctx.run_sub_agent)(agent_id, args.variables, ctx.depth + 1).await {
            Ok(output) => output,
            Err(e) => format!("Sub-agent execution error: {e}"),
        }
    }
}

async fn resolve_agent_id(ctx: &ToolContext<'_>, args: &Args) -> Result<Option<Uuid>, String> {
    if let Some(id) = args.agent_id {
        return Ok(Some(id));
    }
    let Some(name) = &args.agent_name else {
        return Ok(None);
    };

    let row: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM saved_agents WHERE lower(name) = lower($1)",
    )
    .bind(name)
    .fetch_optional(ctx.pool)
    .await
    .map_err(|e| format!("Sub-agent execution error: {e}"))?;

    match row {
        Some((id,)) => Ok(Some(id)),
        None => Err(format!("Error: No agent found with name '{name}'")),
    }
}

async fn list_available_agents(ctx: &ToolContext<'_>) -> String {
    let rows: Result<Vec<(Uuid, String, Option<String>)>, _> = sqlx::query_as(
        "SELECT id, name, description FROM saved_agents ORDER BY updated_at DESC LIMIT 10",
    )
    .fetch_all(ctx.pool)
    .await;

    match rows {
        Ok(rows) if rows.is_empty() => {
            "No agents available. Create agents from the Playground first.".to_string()
        }
        Ok(rows) => {
            let mut parts = vec!["Available agents (provide agent_id or agent_name):\n".to_string()];
            for (id, name, description) in rows {
                let desc = description.map(|d| format!(" - {d}")).unwrap_or_default();
                parts.push(format!("  - {name} (id: {id}){desc}"));
            }
            parts.join("\n")
        }
        Err(e) => format!("Sub-agent execution error: {e}"),
    }
}
