//! Request/response types for the OpenAI-compatible chat-completions API.
//!
//! A message is kept as a loosely-typed JSON map (mirroring
//! `kb-service/agent_executor.py`'s plain dicts) rather than a rigid struct,
//! because assistant messages carrying `tool_calls` and tool-role messages
//! carrying `tool_call_id` have shapes that vary by role; forcing one struct
//! on all of them would mean most fields are `Option` on most variants
//! anyway.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub type ChatMessage = serde_json::Map<String, Value>;

pub fn system_message(content: &str) -> ChatMessage {
    message("system", content)
}

pub fn user_message(content: &str) -> ChatMessage {
    message("user", content)
}

pub fn assistant_message(content: &str) -> ChatMessage {
    message("assistant", content)
}

fn message(role: &str, content: &str) -> ChatMessage {
    let mut m = serde_json::Map::new();
    m.insert("role".to_string(), json!(role));
    m.insert("content".to_string(), json!(content));
    m
}

pub fn tool_result_message(tool_call_id: &str, content: &str) -> ChatMessage {
    let mut m = serde_json::Map::new();
    m.insert("role".to_string(), json!("tool"));
    m.insert("tool_call_id".to_string(), json!(tool_call_id));
    m.insert("content".to_string(), json!(content));
    m
}

/// A tool schema in the upstream function-calling convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ToolFunctionSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSchema {
    pub fn new(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            kind: "function".to_string(),
            function: ToolFunctionSchema {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }
}

/// A parsed tool call from a non-streaming response
/// (`choices[0].message.tool_calls[*]`).
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Generation parameters mapped onto the request body: always-present
/// fields, conditionally-present fields only when not at their neutral
/// default.
#[derive(Debug, Clone)]
pub struct ChatRequestParams {
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: i64,
    pub max_tokens: u32,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
    pub repetition_penalty: f64,
    pub seed: Option<String>,
    pub stop_sequences: String,
    pub json_mode: bool,
    pub thinking: bool,
}

impl ChatRequestParams {
    /// Build the base request body (model + sampling params), before
    /// `messages`/`tools` are attached.
    pub fn build_body(&self, stream: bool) -> serde_json::Map<String, Value> {
        let mut body = serde_json::Map::new();
        body.insert("model".to_string(), json!(self.model));
        body.insert("temperature".to_string(), json!(self.temperature));
        body.insert("top_p".to_string(), json!(self.top_p));
        body.insert("max_tokens".to_string(), json!(self.max_tokens));
        body.insert("stream".to_string(), json!(stream));

        if self.top_k > 0 {
            body.insert("top_k".to_string(), json!(self.top_k));
        }
        if self.presence_penalty != 0.0 {
            body.insert("presence_penalty".to_string(), json!(self.presence_penalty));
        }
        if self.frequency_penalty != 0.0 {
            body.insert("frequency_penalty".to_string(), json!(self.frequency_penalty));
        }
        if self.repetition_penalty != 1.0 {
            body.insert(
                "repetition_penalty".to_string(),
                json!(self.repetition_penalty),
            );
        }
        if let Some(seed) = &self.seed {
            if let Ok(parsed) = seed.parse::<i64>() {
                body.insert("seed".to_string(), json!(parsed));
            }
        }
        let stops: Vec<&str> = self
            .stop_sequences
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if !stops.is_empty() {
            body.insert("stop".to_string(), json!(stops));
        }
        if self.json_mode {
            body.insert(
                "response_format".to_string(),
                json!({"type": "json_object"}),
            );
        }
        body.insert(
            "chat_template_kwargs".to_string(),
            json!({"enable_thinking": self.thinking}),
        );
        body
    }
}

/// A decoded non-streaming chat-completion response.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub raw: Value,
}

impl ChatResponse {
    pub fn from_json(raw: Value) -> Self {
        let message = raw
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .cloned()
            .unwrap_or(Value::Null);

        let content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let tool_calls = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|tc| {
                        let id = tc.get("id")?.as_str()?.to_string();
                        let func = tc.get("function")?;
                        let name = func.get("name")?.as_str()?.to_string();
                        let args_str = func.get("arguments").and_then(Value::as_str).unwrap_or("{}");
                        let arguments =
                            serde_json::from_str(args_str).unwrap_or(Value::Object(Default::default()));
                        Some(ToolCall { id, name, arguments })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            content,
            tool_calls,
            raw,
        }
    }

    pub fn assistant_message(&self) -> ChatMessage {
        self.raw
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(|| user_message(&self.content))
    }
}

/// An event emitted while reading a streaming chat-completion response.
/// Only `data: ` lines are parsed; malformed JSON is skipped and `[DONE]`
/// ends the stream.
#[derive(Clone)]
pub enum StreamEvent {
    /// A raw `data: ...` payload forwarded verbatim to the caller, plus the
    /// incremental text content extracted from it (if any).
    Delta { raw_line: String, content: String },
    Done,
}
