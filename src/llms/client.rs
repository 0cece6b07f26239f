//! Thin request builder + streaming reader for the upstream chat-completion
//! and embedding APIs (C7).
//!
//! Corresponds to `kb-service/agent_executor.py::_call_llm` and
//! `_resolve_rag`'s embedding POST. Timeouts: 300s for chat streaming, 30s
//! for embeddings.

use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::{AgentError, AgentResult};
use super::types::{ChatMessage, ChatRequestParams, ChatResponse, StreamEvent, ToolSchema};

const CHAT_TIMEOUT: Duration = Duration::from_secs(300);
const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

struct SseReadState {
    bytes: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    buf: String,
    pending: std::collections::VecDeque<StreamEvent>,
    finished: bool,
}

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    chat_url: String,
    embed_url: String,
}

impl LlmClient {
    pub fn new(chat_url: String, embed_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            chat_url,
            embed_url,
        }
    }

    /// Non-streaming chat completion. Used by ReAct iterations (tool_calls
    /// must be observed atomically) and by sub-agent delegation.
    pub async fn chat(
        &self,
        params: &ChatRequestParams,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> AgentResult<ChatResponse> {
        let mut body = params.build_body(false);
        body.insert("messages".to_string(), json!(messages));
        if let Some(tools) = tools {
            if !tools.is_empty() {
                body.insert("tools".to_string(), json!(tools));
                body.insert("tool_choice".to_string(), json!("auto"));
            }
        }

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.chat_url))
            .timeout(CHAT_TIMEOUT)
            .json(&Value::Object(body))
            .send()
            .await
            .map_err(|e| AgentError::Upstream(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AgentError::Upstream(format!("{status}: {text}")));
        }

        let raw: Value = resp.json().await.map_err(|e| AgentError::Upstream(e.to_string()))?;
        Ok(ChatResponse::from_json(raw))
    }

    /// Streaming chat completion. Yields one [`StreamEvent`] per SSE line;
    /// malformed chunks are skipped, not surfaced.
    pub async fn chat_stream(
        &self,
        params: &ChatRequestParams,
        messages: &[ChatMessage],
    ) -> AgentResult<impl futures::Stream<Item = StreamEvent>> {
        let mut body = params.build_body(true);
        body.insert("messages".to_string(), json!(messages));

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.chat_url))
            .timeout(CHAT_TIMEOUT)
            .json(&Value::Object(body))
            .send()
            .await
            .map_err(|e| AgentError::Upstream(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AgentError::Upstream(format!("{status}: {text}")));
        }

        let state = SseReadState {
            bytes: resp.bytes_stream().boxed(),
            buf: String::new(),
            pending: std::collections::VecDeque::new(),
            finished: false,
        };

        Ok(futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    if matches!(event, StreamEvent::Done) {
                        state.finished = true;
                    }
                    return Some((event, state));
                }
                if state.finished {
                    return None;
                }

                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        state.buf.push_str(&String::from_utf8_lossy(&chunk));
                        while let Some(pos) = state.buf.find('\n') {
                            let line = state.buf[..pos].trim_end_matches('\r').to_string();
                            state.buf.drain(..=pos);
                            if line.is_empty() {
                                continue;
                            }
                            if let Some(event) = super::sse::parse_line(&line) {
                                state.pending.push_back(event);
                            }
                        }
                    }
                    _ => return None,
                }
            }
        }))
    }

    /// Embed a single input string via `POST /embeddings`.
    pub async fn embed(&self, model: &str, input: &str) -> AgentResult<Vec<f32>> {
        let resp = self
            .http
            .post(format!("{}/embeddings", self.embed_url))
            .timeout(EMBED_TIMEOUT)
            .json(&json!({ "model": model, "input": input }))
            .send()
            .await
            .map_err(|e| AgentError::Upstream(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(AgentError::Upstream(format!("embeddings returned {status}")));
        }

        let body: Value = resp.json().await.map_err(|e| AgentError::Upstream(e.to_string()))?;
        let embedding = body
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|d| d.get("embedding"))
            .and_then(Value::as_array)
            .ok_or_else(|| AgentError::Upstream("empty embeddings response".to_string()))?;

        Ok(embedding
            .iter()
            .filter_map(Value::as_f64)
            .map(|v| v as f32)
            .collect())
    }

    /// Auto-discover the embedding model id via `GET /models`.
    pub async fn discover_embed_model(&self) -> AgentResult<String> {
        let resp = self
            .http
            .get(format!("{}/models", self.embed_url))
            .timeout(EMBED_TIMEOUT)
            .send()
            .await
            .map_err(|e| AgentError::Upstream(e.to_string()))?;
        let body: Value = resp.json().await.map_err(|e| AgentError::Upstream(e.to_string()))?;
        body.get("data")
            .and_then(|d| d.get(0))
            .and_then(|d| d.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AgentError::Upstream("no embedding model discovered".to_string()))
    }
}
