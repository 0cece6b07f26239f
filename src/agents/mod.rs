//! Agent Executor (C4).
//!
//! Corresponds to `kb-service/agent_executor.py::AgentExecutor`, split into
//! the event wire format ([`events`]) and the execution loop itself
//! ([`executor`]).

pub mod events;
pub mod executor;

pub use events::AgentEvent;
pub use executor::{run, ExecutionOutcome, RunContext, ToolCallRecord};
