//! Template Resolver (C3).
//!
//! Corresponds to `kb-service/agent_executor.py::_resolve_template`.
//! Substitutes `{{name}}` placeholders from a merged variable map. Names in
//! the reserved set (`context` plus each configured source's alias) are left
//! literal so the retrieval engine (C2) can substitute them afterward —
//! unless the caller supplied an explicit value for that name, in which case
//! the caller's value wins (so a workflow step can override a placeholder
//! that would otherwise be reserved for RAG injection).

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

static VARIABLE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{(\w+)\}\}").unwrap());

/// Resolve `{{name}}` placeholders in `template` against `vars`.
///
/// Names present in `reserved` are left untouched unless `vars` contains an
/// explicit entry for them. Unknown, non-reserved names resolve to `""`.
pub fn resolve(template: &str, vars: &HashMap<String, String>, reserved: &HashSet<String>) -> String {
    VARIABLE_PATTERN
        .replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            if let Some(v) = vars.get(name) {
                return v.clone();
            }
            if reserved.contains(name) {
                return caps[0].to_string();
            }
            String::new()
        })
        .into_owned()
}

/// Strip any remaining reserved placeholders (e.g. an alias with no
/// retrieved passages to inject) so none leak to the model.
pub fn strip_placeholders(text: &str, names: &HashSet<String>) -> String {
    let mut out = text.to_string();
    for name in names {
        out = out.replace(&format!("{{{{{name}}}}}"), "");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn substitutes_known_names() {
        let vars = HashMap::from([("city".to_string(), "Ankara".to_string())]);
        let out = resolve("Weather in {{city}} today", &vars, &HashSet::new());
        assert_eq!(out, "Weather in Ankara today");
    }

    #[test]
    fn unknown_names_resolve_to_empty() {
        let out = resolve("Hello {{name}}", &HashMap::new(), &HashSet::new());
        assert_eq!(out, "Hello ");
    }

    #[test]
    fn reserved_names_left_literal_unless_overridden() {
        let reserved = set(&["context"]);
        let out = resolve("Answer using {{context}}", &HashMap::new(), &reserved);
        assert_eq!(out, "Answer using {{context}}");

        let vars = HashMap::from([("context".to_string(), "override".to_string())]);
        let out = resolve("Answer using {{context}}", &vars, &reserved);
        assert_eq!(out, "Answer using override");
    }

    #[test]
    fn passthrough_without_placeholders() {
        let out = resolve("no placeholders here", &HashMap::new(), &HashSet::new());
        assert_eq!(out, "no placeholders here");
    }

    #[test]
    fn idempotent_with_no_reserved_names() {
        let vars = HashMap::from([("x".to_string(), "1".to_string())]);
        let once = resolve("{{x}} and {{y}}", &vars, &HashSet::new());
        let twice = resolve(&once, &vars, &HashSet::new());
        assert_eq!(once, twice);
    }

    #[test]
    fn strips_leftover_reserved_placeholders() {
        let names = set(&["manual_kb", "context"]);
        let out = strip_placeholders("see {{manual_kb}} and {{context}}", &names);
        assert_eq!(out, "see  and ");
    }
}
