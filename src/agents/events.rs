//! SSE event types emitted by the executor.
//!
//! Corresponds to `kb-service/agent_executor.py`'s `sse_event`/`sse_data`/
//! `sse_done` helpers, generalized to a closed `AgentEvent` enum so the
//! workflow runner (C5) can pattern-match and re-wrap events instead of
//! re-parsing formatted strings.

use serde_json::Value;

/// One event in an agent run's SSE stream. `Done` is the `data: [DONE]`
/// terminator rather than a named `event:` frame. Serialization is
/// hand-rolled in [`AgentEvent::to_sse`] rather than derived, since `Raw`
/// carries an already-formatted line.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    AgentStart {
        mode: &'static str,
        max_iterations: u32,
        tools: Vec<String>,
    },
    IterationStart {
        iteration: u32,
    },
    ToolCall {
        iteration: u32,
        tool: String,
        args: Value,
        call_id: String,
    },
    ToolResult {
        iteration: u32,
        tool: String,
        call_id: String,
        result: String,
    },
    FinalAnswerStart {
        iteration: u32,
    },
    /// A content chunk. Used both for simple-mode token deltas (content is
    /// the incremental piece) and ReAct's single whole-text emission.
    Stream {
        content: String,
    },
    AgentDone {
        iterations: u32,
        tools_used: Vec<String>,
        total_tool_calls: usize,
    },
    Error {
        message: String,
        iteration: Option<u32>,
    },
    /// Raw passthrough of an upstream `data: <json>` line (simple mode's
    /// streaming branch re-emits the vendor payload verbatim rather than a
    /// re-derived `Stream` event).
    Raw {
        line: String,
        content: String,
    },
}

impl AgentEvent {
    /// The `event:` name used on the wire. `Raw` has no named event —
    /// it is forwarded as a bare `data:` line, matching `sse_data` in the
    /// original service.
    fn name(&self) -> Option<&'static str> {
        match self {
            AgentEvent::AgentStart { .. } => Some("agent_start"),
            AgentEvent::IterationStart { .. } => Some("iteration_start"),
            AgentEvent::ToolCall { .. } => Some("tool_call"),
            AgentEvent::ToolResult { .. } => Some("tool_result"),
            AgentEvent::FinalAnswerStart { .. } => Some("final_answer_start"),
            AgentEvent::Stream { .. } => Some("stream"),
            AgentEvent::AgentDone { .. } => Some("agent_done"),
            AgentEvent::Error { .. } => Some("error"),
            AgentEvent::Raw { .. } => None,
        }
    }

    fn payload(&self) -> Value {
        match self {
            AgentEvent::AgentStart { mode, max_iterations, tools } => {
                serde_json::json!({"mode": mode, "max_iterations": max_iterations, "tools": tools})
            }
            AgentEvent::IterationStart { iteration } => serde_json::json!({"iteration": iteration}),
            AgentEvent::ToolCall { iteration, tool, args, call_id } => {
                serde_json::json!({"iteration": iteration, "tool": tool, "args": args, "call_id": call_id})
            }
            AgentEvent::ToolResult { iteration, tool, call_id, result } => {
                serde_json::json!({"iteration": iteration, "tool": tool, "call_id": call_id, "result": result})
            }
            AgentEvent::FinalAnswerStart { iteration } => serde_json::json!({"iteration": iteration}),
            AgentEvent::Stream { content } => serde_json::json!({"content": content}),
            AgentEvent::AgentDone { iterations, tools_used, total_tool_calls } => {
                serde_json::json!({"iterations": iterations, "tools_used": tools_used, "total_tool_calls": total_tool_calls})
            }
            AgentEvent::Error { message, iteration } => {
                serde_json::json!({"message": message, "iteration": iteration})
            }
            AgentEvent::Raw { .. } => Value::Null,
        }
    }

    /// Format as wire bytes: `event: <type>\ndata: <json>\n\n`, or the
    /// verbatim upstream `data: ...` line (already newline-free) for `Raw`.
    pub fn to_sse(&self) -> String {
        match self {
            AgentEvent::Raw { line, .. } => format!("{line}\n\n"),
            _ => format!("event: {}\ndata: {}\n\n", self.name().unwrap(), self.payload()),
        }
    }
}

/// The `data: [DONE]\n\n` stream terminator.
pub fn done_marker() -> &'static str {
    "data: [DONE]\n\n"
}

/// Prefix a step-scoped event for the workflow runner:
/// `agent_start` becomes `step_agent_start`, carrying `step_id`/`step_index`
/// alongside the original payload. A `Raw` simple-mode chunk is unwrapped
/// into a `step_stream` event carrying only its extracted delta text.
pub fn wrap_step_event(step_id: &str, step_index: usize, event: &AgentEvent) -> String {
    if let AgentEvent::Raw { content, .. } = event {
        let payload = serde_json::json!({
            "content": content,
            "step_id": step_id,
            "step_index": step_index,
        });
        return format!("event: step_stream\ndata: {payload}\n\n");
    }

    let inner_name = event.name().unwrap_or("stream");
    let mut payload = event.payload();
    if let Value::Object(map) = &mut payload {
        map.insert("step_id".to_string(), Value::String(step_id.to_string()));
        map.insert("step_index".to_string(), serde_json::json!(step_index));
    }
    format!("event: step_{inner_name}\ndata: {payload}\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_start_serializes_expected_fields() {
        let event = AgentEvent::AgentStart {
            mode: "react",
            max_iterations: 10,
            tools: vec!["kb_search".to_string()],
        };
        let sse = event.to_sse();
        assert!(sse.starts_with("event: agent_start\n"));
        assert!(sse.contains("\"max_iterations\":10"));
    }

    #[test]
    fn raw_forwards_the_line_verbatim() {
        let event = AgentEvent::Raw {
            line: r#"data: {"foo":"bar"}"#.to_string(),
            content: String::new(),
        };
        let sse = event.to_sse();
        assert_eq!(sse, "data: {\"foo\":\"bar\"}\n\n");
    }

    #[test]
    fn wrap_step_event_prefixes_and_injects_scope() {
        let event = AgentEvent::IterationStart { iteration: 2 };
        let wrapped = wrap_step_event("step_1", 0, &event);
        assert!(wrapped.starts_with("event: step_iteration_start\n"));
        assert!(wrapped.contains("\"step_id\":\"step_1\""));
        assert!(wrapped.contains("\"step_index\":0"));
    }
}
