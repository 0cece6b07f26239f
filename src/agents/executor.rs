//! The execution loop itself: simple streaming mode and the ReAct
//! tool-calling loop.
//!
//! Corresponds to `kb-service/agent_executor.py::AgentExecutor.execute_simple`
//! and `execute_react`. Events are forwarded on a bounded channel rather than
//! written directly to an HTTP body — the producer here doesn't know or care
//! whether its consumer is a raw SSE response or the workflow runner
//! re-wrapping events with step scope.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use sqlx::PgPool;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::agent::{AgentConfig, AgentMode};
use crate::agents::events::AgentEvent;
use crate::llms::{
    assistant_message, system_message, tool_result_message, user_message, ChatMessage,
    ChatRequestParams, LlmClient, StreamEvent, ToolCall,
};
use crate::rag::{self, SourceDebug};
use crate::template;
use crate::tools::{self, AgentTool, SubAgentFuture, ToolContext};

/// Cap applied to the text stored in a history record, not to what is
/// actually streamed to the caller (`get_history_payload`'s `text[:50000]`).
const MAX_HISTORY_TEXT: usize = 50_000;

/// A single tool invocation, kept for the history sink (C6).
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub iteration: u32,
    pub tool: String,
    pub args: serde_json::Value,
    pub result: String,
}

/// Everything a caller needs once a run has stopped producing events.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    pub full_text: String,
    pub messages: Vec<ChatMessage>,
    pub tool_calls: Vec<ToolCallRecord>,
    pub iterations_used: u32,
    pub rag_used: bool,
    pub rag_debug: HashMap<String, SourceDebug>,
}

impl ExecutionOutcome {
    /// The text + truncation flag a history row should record
    /// (`get_history_payload`'s `res_payload`).
    pub fn history_text(&self) -> (String, bool) {
        let len = self.full_text.chars().count();
        if len > MAX_HISTORY_TEXT {
            (self.full_text.chars().take(MAX_HISTORY_TEXT).collect(), true)
        } else {
            (self.full_text.clone(), false)
        }
    }

    /// Tool names in call order, duplicates preserved — matches the
    /// original's `[tc["tool"] for tc in self.tool_calls_made]`.
    pub fn tools_used(&self) -> Vec<String> {
        self.tool_calls.iter().map(|c| c.tool.clone()).collect()
    }
}

/// The execution environment threaded through a run and its sub-agent
/// delegations. Borrowed, not owned — a run never outlives its caller.
pub struct RunContext<'a> {
    pub pool: &'a PgPool,
    pub llm: &'a LlmClient,
    pub embed_model: &'a str,
    pub depth: u32,
}

fn should_use_react(config: &AgentConfig, has_tools: bool) -> bool {
    config.mode == AgentMode::React && has_tools
}

/// Run one agent to completion, forwarding [`AgentEvent`]s on `events_tx` as
/// they occur. `stream` only matters in simple mode — ReAct always calls the
/// upstream API non-streaming per iteration so `tool_calls` can be observed
/// atomically.
pub async fn run(
    ctx: RunContext<'_>,
    config: &AgentConfig,
    variables: HashMap<String, String>,
    stream: bool,
    events_tx: mpsc::Sender<AgentEvent>,
) -> ExecutionOutcome {
    let merged_vars = config.merge_variables(&variables);
    let reserved = config.reserved_names();

    let resolved_prompt = template::resolve(&config.prompt_template, &merged_vars, &reserved);
    let resolved_system = template::resolve(&config.system_prompt, &merged_vars, &reserved);

    let rag_outcome = rag::retrieve_and_inject(
        ctx.pool,
        ctx.llm,
        ctx.embed_model,
        config,
        &merged_vars,
        resolved_prompt,
        resolved_system,
    )
    .await;

    let mut messages: Vec<ChatMessage> = Vec::new();
    if !rag_outcome.system.trim().is_empty() {
        messages.push(system_message(&rag_outcome.system));
    }
    messages.push(user_message(&rag_outcome.prompt));

    let params = ChatRequestParams {
        model: config.model.clone(),
        temperature: config.temperature,
        top_p: config.top_p,
        top_k: config.top_k,
        max_tokens: config.max_tokens,
        presence_penalty: config.presence_penalty,
        frequency_penalty: config.frequency_penalty,
        repetition_penalty: config.repetition_penalty,
        seed: config.seed.clone(),
        stop_sequences: config.stop_sequences.clone(),
        json_mode: config.json_mode,
        thinking: config.effective_thinking(),
    };

    let resolved_tools = tools::resolve(&config.enabled_tools);

    let mut outcome = if should_use_react(config, !resolved_tools.is_empty()) {
        execute_react(&ctx, config, &params, messages, &resolved_tools, &events_tx).await
    } else {
        execute_simple(&ctx, &params, messages, stream, &events_tx).await
    };

    outcome.rag_used = rag_outcome.used;
    outcome.rag_debug = rag_outcome.debug;
    outcome
}

/// Single-shot completion: stream deltas verbatim, or call non-streaming
/// when the caller asked for a plain response (`execute_simple`).
async fn execute_simple(
    ctx: &RunContext<'_>,
    params: &ChatRequestParams,
    mut messages: Vec<ChatMessage>,
    stream: bool,
    events_tx: &mpsc::Sender<AgentEvent>,
) -> ExecutionOutcome {
    let mut full_text = String::new();

    if stream {
        match ctx.llm.chat_stream(params, &messages).await {
            Ok(events) => {
                futures::pin_mut!(events);
                while let Some(event) = events.next().await {
                    match event {
                        StreamEvent::Delta { raw_line, content } => {
                            if !content.is_empty() {
                                full_text.push_str(&content);
                            }
                            let _ = events_tx.send(AgentEvent::Raw { line: raw_line, content }).await;
                        }
                        StreamEvent::Done => break,
                    }
                }
            }
            Err(e) => {
                let _ = events_tx
                    .send(AgentEvent::Error { message: e.to_string(), iteration: None })
                    .await;
            }
        }
    } else {
        match ctx.llm.chat(params, &messages, None).await {
            Ok(resp) => {
                full_text = resp.content;
                let _ = events_tx
                    .send(AgentEvent::Stream { content: full_text.clone() })
                    .await;
            }
            Err(e) => {
                let _ = events_tx
                    .send(AgentEvent::Error { message: e.to_string(), iteration: None })
                    .await;
            }
        }
    }

    messages.push(assistant_message(&full_text));

    ExecutionOutcome {
        full_text,
        messages,
        tool_calls: Vec::new(),
        iterations_used: 1,
        rag_used: false,
        rag_debug: HashMap::new(),
    }
}

/// The ReAct loop: iterate non-streaming calls, dispatching every tool call
/// the model requests, until it returns a final answer or `max_iterations`
/// runs out (`execute_react`).
async fn execute_react(
    ctx: &RunContext<'_>,
    config: &AgentConfig,
    params: &ChatRequestParams,
    mut messages: Vec<ChatMessage>,
    resolved_tools: &[Arc<dyn AgentTool>],
    events_tx: &mpsc::Sender<AgentEvent>,
) -> ExecutionOutcome {
    let tool_names: Vec<String> = resolved_tools.iter().map(|t| t.name().to_string()).collect();
    let schemas = tools::schemas(resolved_tools);

    let _ = events_tx
        .send(AgentEvent::AgentStart {
            mode: "react",
            max_iterations: config.max_iterations,
            tools: tool_names,
        })
        .await;

    let mut tool_calls_made: Vec<ToolCallRecord> = Vec::new();

    for iteration in 1..=config.max_iterations {
        let _ = events_tx.send(AgentEvent::IterationStart { iteration }).await;

        let response = match ctx.llm.chat(params, &messages, Some(&schemas)).await {
            Ok(r) => r,
            Err(e) => {
                let _ = events_tx
                    .send(AgentEvent::Error { message: e.to_string(), iteration: Some(iteration) })
                    .await;
                return ExecutionOutcome {
                    full_text: String::new(),
                    messages,
                    tool_calls: tool_calls_made,
                    iterations_used: iteration,
                    rag_used: false,
                    rag_debug: HashMap::new(),
                };
            }
        };

        if response.tool_calls.is_empty() {
            let full_text = response.content.clone();
            messages.push(response.assistant_message());

            let _ = events_tx.send(AgentEvent::FinalAnswerStart { iteration }).await;
            if !full_text.is_empty() {
                let _ = events_tx
                    .send(AgentEvent::Stream { content: full_text.clone() })
                    .await;
            }

            let outcome = ExecutionOutcome {
                full_text,
                messages,
                tool_calls: tool_calls_made,
                iterations_used: iteration,
                rag_used: false,
                rag_debug: HashMap::new(),
            };
            let _ = events_tx
                .send(AgentEvent::AgentDone {
                    iterations: iteration,
                    tools_used: outcome.tools_used(),
                    total_tool_calls: outcome.tool_calls.len(),
                })
                .await;
            return outcome;
        }

        messages.push(response.assistant_message());

        for call in &response.tool_calls {
            let _ = events_tx
                .send(AgentEvent::ToolCall {
                    iteration,
                    tool: call.name.clone(),
                    args: call.arguments.clone(),
                    call_id: call.id.clone(),
                })
                .await;

            let result = dispatch_tool(ctx, call).await;

            let _ = events_tx
                .send(AgentEvent::ToolResult {
                    iteration,
                    tool: call.name.clone(),
                    call_id: call.id.clone(),
                    result: result.clone(),
                })
                .await;

            messages.push(tool_result_message(&call.id, &result));
            tool_calls_made.push(ToolCallRecord {
                iteration,
                tool: call.name.clone(),
                args: call.arguments.clone(),
                result,
            });
        }
    }

    let _ = events_tx
        .send(AgentEvent::Error {
            message: format!(
                "Max iterations ({}) reached without final answer",
                config.max_iterations
            ),
            iteration: None,
        })
        .await;

    ExecutionOutcome {
        full_text: String::new(),
        messages,
        tool_calls: tool_calls_made,
        iterations_used: config.max_iterations,
        rag_used: false,
        rag_debug: HashMap::new(),
    }
}

/// Look up and run one tool call, supplying a sub-agent runner that
/// re-enters [`run`] in simple mode at `depth + 1`
/// (`kb-service/tools/sub_agent.py`'s delegation into a nested executor).
async fn dispatch_tool(ctx: &RunContext<'_>, call: &ToolCall) -> String {
    let pool = ctx.pool;
    let llm = ctx.llm;
    let embed_model = ctx.embed_model;
    let depth = ctx.depth;

    let runner = move |agent_id: Uuid, vars: HashMap<String, String>, next_depth: u32| -> SubAgentFuture<'_> {
        Box::pin(run_sub_agent(pool, llm, embed_model, agent_id, vars, next_depth))
    };

    let tool_ctx = ToolContext {
        pool,
        llm,
        embed_model,
        depth,
        run_sub_agent: &runner,
    };

    match tools::find(&call.name) {
        Some(tool) => tool.execute(call.arguments.clone(), &tool_ctx).await,
        None => format!("Error: unknown tool '{}'", call.name),
    }
}

/// Load a saved agent and run it to completion in simple mode, collecting
/// its full output as the `sub_agent` tool's result text. The sub-run's own
/// events are drained and discarded — only the caller's top-level stream is
/// visible to the client (`_run_sub_agent`'s internal accumulator).
async fn run_sub_agent(
    pool: &PgPool,
    llm: &LlmClient,
    embed_model: &str,
    agent_id: Uuid,
    variables: HashMap<String, String>,
    depth: u32,
) -> Result<String, String> {
    let row: Option<(sqlx::types::Json<AgentConfig>,)> =
        sqlx::query_as("SELECT config FROM saved_agents WHERE id = $1")
            .bind(agent_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| e.to_string())?;

    let Some((sqlx::types::Json(mut sub_config),)) = row else {
        return Err(format!("sub-agent {agent_id} not found"));
    };
    sub_config.mode = AgentMode::Simple;

    let (tx, mut rx) = mpsc::channel(64);
    tokio::spawn(async move { while rx.recv().await.is_some() {} });

    let sub_ctx = RunContext { pool, llm, embed_model, depth };
    let outcome = Box::pin(run(sub_ctx, &sub_config, variables, true, tx)).await;

    if outcome.full_text.trim().is_empty() {
        Ok("(Sub-agent returned no output)".to_string())
    } else {
        Ok(outcome.full_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AgentConfig {
        AgentConfig {
            id: Uuid::nil(),
            name: "test".to_string(),
            model: "some-model".to_string(),
            temperature: 0.7,
            top_p: 0.9,
            top_k: 0,
            max_tokens: 512,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            repetition_penalty: 1.0,
            seed: None,
            stop_sequences: String::new(),
            thinking: false,
            json_mode: false,
            system_prompt: String::new(),
            prompt_template: "hi".to_string(),
            variables: Vec::new(),
            rag_enabled: false,
            rag_top_k: 3,
            rag_threshold: 0.3,
            rag_sources: Vec::new(),
            source_aliases: HashMap::new(),
            source_config: HashMap::new(),
            mode: AgentMode::React,
            enabled_tools: Vec::new(),
            max_iterations: 10,
        }
    }

    #[test]
    fn react_mode_falls_back_to_simple_without_tools() {
        let config = base_config();
        assert!(!should_use_react(&config, false));
    }

    #[test]
    fn react_mode_engages_with_tools() {
        let config = base_config();
        assert!(should_use_react(&config, true));
    }

    #[test]
    fn simple_mode_never_engages_react() {
        let mut config = base_config();
        config.mode = AgentMode::Simple;
        assert!(!should_use_react(&config, true));
    }

    #[test]
    fn history_text_passes_through_short_output() {
        let outcome = ExecutionOutcome {
            full_text: "short answer".to_string(),
            ..Default::default()
        };
        let (text, truncated) = outcome.history_text();
        assert_eq!(text, "short answer");
        assert!(!truncated);
    }

    #[test]
    fn history_text_truncates_long_output() {
        let outcome = ExecutionOutcome {
            full_text: "x".repeat(MAX_HISTORY_TEXT + 10),
            ..Default::default()
        };
        let (text, truncated) = outcome.history_text();
        assert_eq!(text.chars().count(), MAX_HISTORY_TEXT);
        assert!(truncated);
    }

    #[test]
    fn tools_used_preserves_call_order_and_duplicates() {
        let outcome = ExecutionOutcome {
            tool_calls: vec![
                ToolCallRecord {
                    iteration: 1,
                    tool: "web_fetch".to_string(),
                    args: serde_json::json!({}),
                    result: String::new(),
                },
                ToolCallRecord {
                    iteration: 2,
                    tool: "kb_search".to_string(),
                    args: serde_json::json!({}),
                    result: String::new(),
                },
                ToolCallRecord {
                    iteration: 3,
                    tool: "web_fetch".to_string(),
                    args: serde_json::json!({}),
                    result: String::new(),
                },
            ],
            ..Default::default()
        };
        assert_eq!(
            outcome.tools_used(),
            vec!["web_fetch".to_string(), "kb_search".to_string(), "web_fetch".to_string()]
        );
    }
}
