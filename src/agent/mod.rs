//! Agent configuration — the durable entity the executor (C4) consumes.
//!
//! Corresponds to `kb-service/agent_executor.py::AgentExecutor.__init__`'s
//! config extraction and `models.py::AgentCreate`/`AgentResponse`.

pub mod core;

pub use core::{AgentConfig, AgentMode, ExecutorVariable, RagSourceConfig};
