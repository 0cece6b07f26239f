//! Workflow-level SSE events: `step_start` / `step_done` / `step_error` /
//! `workflow_done`.
//!
//! These are distinct from the child agent's own events forwarded through
//! [`crate::agents::wrap_step_event`] — a step emits both: its own
//! `step_start`/`step_done`/`step_error` markers, and the wrapped
//! `step_agent_start`/`step_tool_call`/... stream from the agent it runs.

use std::collections::HashMap;

/// Preview length for `workflow_done.step_outputs`.
const STEP_OUTPUT_PREVIEW_LEN: usize = 200;

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    StepStart {
        step_id: String,
        index: usize,
        agent_name: String,
    },
    StepDone {
        step_id: String,
        index: usize,
    },
    StepError {
        step_id: String,
        index: usize,
        message: String,
    },
    WorkflowDone {
        total_steps: usize,
        step_outputs: HashMap<String, String>,
    },
}

impl WorkflowEvent {
    pub fn to_sse(&self) -> String {
        match self {
            WorkflowEvent::StepStart { step_id, index, agent_name } => format!(
                "event: step_start\ndata: {}\n\n",
                serde_json::json!({"step_id": step_id, "index": index, "agent_name": agent_name})
            ),
            WorkflowEvent::StepDone { step_id, index } => format!(
                "event: step_done\ndata: {}\n\n",
                serde_json::json!({"step_id": step_id, "index": index})
            ),
            WorkflowEvent::StepError { step_id, index, message } => format!(
                "event: step_error\ndata: {}\n\n",
                serde_json::json!({"step_id": step_id, "index": index, "message": message})
            ),
            WorkflowEvent::WorkflowDone { total_steps, step_outputs } => {
                let previewed: HashMap<&String, String> = step_outputs
                    .iter()
                    .map(|(id, text)| (id, preview(text)))
                    .collect();
                format!(
                    "event: workflow_done\ndata: {}\n\n",
                    serde_json::json!({"total_steps": total_steps, "step_outputs": previewed})
                )
            }
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > STEP_OUTPUT_PREVIEW_LEN {
        text.chars().take(STEP_OUTPUT_PREVIEW_LEN).collect()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_start_serializes_fields() {
        let event = WorkflowEvent::StepStart {
            step_id: "step_1".to_string(),
            index: 0,
            agent_name: "classifier".to_string(),
        };
        let sse = event.to_sse();
        assert!(sse.starts_with("event: step_start\n"));
        assert!(sse.contains("\"agent_name\":\"classifier\""));
    }

    #[test]
    fn workflow_done_previews_long_outputs() {
        let mut step_outputs = HashMap::new();
        step_outputs.insert("step_1".to_string(), "x".repeat(300));
        let event = WorkflowEvent::WorkflowDone { total_steps: 1, step_outputs };
        let sse = event.to_sse();
        assert!(sse.contains(&"x".repeat(200)));
        assert!(!sse.contains(&"x".repeat(201)));
    }
}
