//! [`AgentConfig`] — the durable agent entity.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Execution strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    Simple,
    React,
}

impl Default for AgentMode {
    fn default() -> Self {
        AgentMode::Simple
    }
}

/// A declared template variable with a default value, used when the caller
/// doesn't supply one (`kb-service/agent_executor.py`'s `config["variables"]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorVariable {
    pub name: String,
    #[serde(default)]
    pub default_value: String,
}

/// Per-source retrieval overrides (`source_config`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RagSourceConfig {
    pub top_k: Option<u32>,
    pub threshold: Option<f64>,
}

/// The full durable agent configuration consumed by the executor.
///
/// Mirrors `saved_agents.config` JSONB: generation parameters, the template
/// surface, retrieval policy, and the agentic/tool-calling policy blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub id: Uuid,
    pub name: String,

    // --- Generation parameters ---
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default)]
    pub top_k: i64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub presence_penalty: f64,
    #[serde(default)]
    pub frequency_penalty: f64,
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f64,
    #[serde(default)]
    pub seed: Option<String>,
    #[serde(default)]
    pub stop_sequences: String,

    // --- Output shaping ---
    #[serde(default)]
    pub thinking: bool,
    #[serde(default)]
    pub json_mode: bool,

    // --- Template surface ---
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub prompt_template: String,
    #[serde(default)]
    pub variables: Vec<ExecutorVariable>,

    // --- Retrieval policy ---
    #[serde(default)]
    pub rag_enabled: bool,
    #[serde(default = "default_top_k_global")]
    pub rag_top_k: u32,
    #[serde(default = "default_threshold")]
    pub rag_threshold: f64,
    #[serde(default)]
    pub rag_sources: Vec<String>,
    #[serde(default)]
    pub source_aliases: HashMap<String, String>,
    #[serde(default)]
    pub source_config: HashMap<String, RagSourceConfig>,

    // --- Agentic policy ---
    #[serde(default)]
    pub mode: AgentMode,
    #[serde(default)]
    pub enabled_tools: Vec<String>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_temperature() -> f64 {
    0.7
}
fn default_top_p() -> f64 {
    0.9
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_repetition_penalty() -> f64 {
    1.0
}
fn default_top_k_global() -> u32 {
    3
}
fn default_threshold() -> f64 {
    0.3
}
fn default_max_iterations() -> u32 {
    10
}

impl AgentConfig {
    /// Merge declared-variable defaults with caller-supplied values, caller
    /// values winning (`kb-service/agent_executor.py::execute_simple`).
    pub fn merge_variables(&self, caller_vars: &HashMap<String, String>) -> HashMap<String, String> {
        let mut merged = HashMap::new();
        for v in &self.variables {
            merged.insert(v.name.clone(), v.default_value.clone());
        }
        for (k, v) in caller_vars {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }

    /// The reserved placeholder namespace: `context` plus every configured
    /// source's alias (explicit, or derived by lowercasing/underscoring the
    /// source name).
    pub fn reserved_names(&self) -> std::collections::HashSet<String> {
        let mut names: std::collections::HashSet<String> = ["context".to_string()].into();
        for src in &self.rag_sources {
            names.insert(self.alias_for(src));
        }
        names
    }

    pub fn alias_for(&self, source: &str) -> String {
        if let Some(alias) = self.source_aliases.get(source) {
            return alias.clone();
        }
        source
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect()
    }

    /// `json_mode` wins over `thinking` — chain-of-thought tags break strict
    /// JSON parsing.
    pub fn effective_thinking(&self) -> bool {
        self.thinking && !self.json_mode
    }

    /// Fail fast at run start on a missing model or template — a 400-class
    /// error, with no history row written.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("agent config is missing a model id".to_string());
        }
        if self.prompt_template.trim().is_empty() {
            return Err("agent config is missing a prompt_template".to_string());
        }
        Ok(())
    }
}
