//! agentd — an LLM agent orchestration engine.
//!
//! A ReAct tool-calling loop (C4) over a hybrid BM25+vector retrieval layer
//! (C2) with per-source quotas and Turkish synonym expansion, a template
//! resolver (C3) for prompt variable substitution, a workflow runner (C5)
//! piping step outputs between agents, and the ambient stack (config,
//! persistence, HTTP surface) that wires it all together behind an
//! OpenAI-compatible chat/embedding backend (C7).

pub mod agent;
pub mod agents;
pub mod config;
pub mod db;
pub mod error;
pub mod history;
pub mod llms;
pub mod rag;
pub mod server;
pub mod template;
pub mod tools;
pub mod workflow;

pub const VERSION: &str = "0.1.0";
