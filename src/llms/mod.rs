//! LLM Backend Adapter (C7) and embedding client.
//!
//! Corresponds to `kb-service/agent_executor.py`'s `_call_llm`/`_build_base_body`
//! and `_resolve_rag`'s embedding call, generalized into a standalone client
//! the executor (C4), retrieval engine (C2), and tools (C1) all share.

pub mod client;
pub mod sse;
pub mod types;

pub use client::LlmClient;
pub use types::{
    assistant_message, system_message, tool_result_message, user_message, ChatMessage,
    ChatRequestParams, ChatResponse, StreamEvent, ToolCall, ToolSchema,
};
