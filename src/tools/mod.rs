//! Agent Tool Registry (C1).
//!
//! Corresponds to `kb-service/tools/*.py`, generalized into a fixed set of
//! four built-in tools selected per-agent by name (`enabled_tools`).

pub mod dataset_query;
pub mod kb_search;
pub mod sub_agent;
pub mod web_fetch;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::llms::{LlmClient, ToolSchema};

/// Resolves a sub-agent run without an HTTP round trip back into this
/// process (`kb-service/tools/sub_agent.py`'s `run_agent_func`). Boxed to
/// break the dependency cycle between the tool registry and the executor
/// that owns it.
pub type SubAgentFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;
pub type SubAgentRunner<'a> =
    &'a (dyn Fn(Uuid, HashMap<String, String>, u32) -> SubAgentFuture<'a> + Send + Sync);

/// Everything a tool handler needs to run, threaded through from the
/// executor for the duration of one `execute` call.
pub struct ToolContext<'a> {
    pub pool: &'a PgPool,
    pub llm: &'a LlmClient,
    pub embed_model: &'a str,
    pub depth: u32,
    pub run_sub_agent: SubAgentRunner<'a>,
}

/// A single callable tool: its function-calling schema, and the async
/// handler that turns arguments into a string result for the model
/// (`kb-service/tools/*.py`'s `{NAME}_TOOL` + `execute_{name}` pairs).
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &'static str;
    fn schema(&self) -> ToolSchema;
    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> String;
}

static ALL_TOOLS: Lazy<Vec<Arc<dyn AgentTool>>> = Lazy::new(|| {
    vec![
        Arc::new(kb_search::KbSearchTool) as Arc<dyn AgentTool>,
        Arc::new(dataset_query::DatasetQueryTool) as Arc<dyn AgentTool>,
        Arc::new(web_fetch::WebFetchTool) as Arc<dyn AgentTool>,
        Arc::new(sub_agent::SubAgentTool) as Arc<dyn AgentTool>,
    ]
});

/// Look up a built-in tool by name.
pub fn find(name: &str) -> Option<Arc<dyn AgentTool>> {
    ALL_TOOLS.iter().find(|t| t.name() == name).cloned()
}

/// Resolve an agent's `enabled_tools` list into concrete tool handlers,
/// silently dropping unknown names (the registry is intentionally fixed —
/// no user-defined tools).
pub fn resolve(enabled_tools: &[String]) -> Vec<Arc<dyn AgentTool>> {
    enabled_tools.iter().filter_map(|n| find(n)).collect()
}

/// Schemas for a set of resolved tools, in the shape the chat-completions
/// API expects under `tools`.
pub fn schemas(tools: &[Arc<dyn AgentTool>]) -> Vec<ToolSchema> {
    tools.iter().map(|t| t.schema()).collect()
}

/// Every built-in tool's schema, regardless of which agent enables it —
/// for the `GET /api/agents/tools` discovery endpoint.
pub fn all_schemas() -> Vec<ToolSchema> {
    ALL_TOOLS.iter().map(|t| t.schema()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_drops_unknown_names() {
        let tools = resolve(&[
            "kb_search".to_string(),
            "not_a_real_tool".to_string(),
            "web_fetch".to_string(),
        ]);
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["kb_search", "web_fetch"]);
    }

    #[test]
    fn find_is_case_sensitive_and_exact() {
        assert!(find("kb_search").is_some());
        assert!(find("KB_SEARCH").is_none());
    }
}
