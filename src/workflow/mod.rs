//! Workflow Runner (C5): an ordered pipeline of agents whose outputs feed
//! the next step's variables, with step-scoped SSE forwarding and per-step
//! failure isolation.

pub mod events;
pub mod runner;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub use events::WorkflowEvent;
pub use runner::run;

/// A variable-mapping value-source expression. Parsed once per step rather
/// than re-matched as a string on every resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// `{{prev_output}}` — the immediately preceding step's full output.
    PrevOutput,
    /// `{{step:S}}` — step `S`'s full output; `S` must precede this step.
    StepRef(String),
    /// `{{input:K}}` — key `K` from the caller's `variables` map.
    InputRef(String),
    /// Any other string, taken verbatim.
    Literal(String),
}

impl Expr {
    pub fn parse(raw: &str) -> Self {
        if raw == "{{prev_output}}" {
            return Expr::PrevOutput;
        }
        if let Some(id) = raw.strip_prefix("{{step:").and_then(|s| s.strip_suffix("}}")) {
            return Expr::StepRef(id.to_string());
        }
        if let Some(key) = raw.strip_prefix("{{input:").and_then(|s| s.strip_suffix("}}")) {
            return Expr::InputRef(key.to_string());
        }
        Expr::Literal(raw.to_string())
    }

    pub fn resolve(
        &self,
        prev_output: &str,
        step_outputs: &HashMap<String, String>,
        caller_variables: &HashMap<String, String>,
    ) -> String {
        match self {
            Expr::PrevOutput => prev_output.to_string(),
            Expr::StepRef(id) => step_outputs.get(id).cloned().unwrap_or_default(),
            Expr::InputRef(key) => caller_variables.get(key).cloned().unwrap_or_default(),
            Expr::Literal(s) => s.clone(),
        }
    }
}

/// Resolve a step's `variable_mappings` to a concrete variable map, ready to
/// merge into the child agent's config defaults.
pub fn resolve_mappings(
    mappings: &HashMap<String, String>,
    prev_output: &str,
    step_outputs: &HashMap<String, String>,
    caller_variables: &HashMap<String, String>,
) -> HashMap<String, String> {
    mappings
        .iter()
        .map(|(name, raw)| {
            let value = Expr::parse(raw).resolve(prev_output, step_outputs, caller_variables);
            (name.clone(), value)
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    pub agent_id: Uuid,
    #[serde(default)]
    pub variable_mappings: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<WorkflowStep>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prev_output() {
        assert_eq!(Expr::parse("{{prev_output}}"), Expr::PrevOutput);
    }

    #[test]
    fn parses_step_ref() {
        assert_eq!(Expr::parse("{{step:step_1}}"), Expr::StepRef("step_1".to_string()));
    }

    #[test]
    fn parses_input_ref() {
        assert_eq!(Expr::parse("{{input:q}}"), Expr::InputRef("q".to_string()));
    }

    #[test]
    fn anything_else_is_literal() {
        assert_eq!(Expr::parse("fixed value"), Expr::Literal("fixed value".to_string()));
        assert_eq!(Expr::parse("{{unknown_form}}"), Expr::Literal("{{unknown_form}}".to_string()));
    }

    #[test]
    fn resolve_mappings_pipes_prior_step_and_caller_input() {
        let mut mappings = HashMap::new();
        mappings.insert("context".to_string(), "{{step:step_1}}".to_string());
        mappings.insert("original".to_string(), "{{input:q}}".to_string());

        let mut step_outputs = HashMap::new();
        step_outputs.insert("step_1".to_string(), "step one output".to_string());
        let mut caller = HashMap::new();
        caller.insert("q".to_string(), "What is X?".to_string());

        let resolved = resolve_mappings(&mappings, "", &step_outputs, &caller);
        assert_eq!(resolved.get("context").unwrap(), "step one output");
        assert_eq!(resolved.get("original").unwrap(), "What is X?");
    }

    #[test]
    fn missing_step_ref_resolves_to_empty() {
        let mut mappings = HashMap::new();
        mappings.insert("x".to_string(), "{{step:never_ran}}".to_string());
        let resolved = resolve_mappings(&mappings, "", &HashMap::new(), &HashMap::new());
        assert_eq!(resolved.get("x").unwrap(), "");
    }
}
