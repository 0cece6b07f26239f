//! Hybrid scoring, per-source quotas, and prompt injection.

use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::agent::AgentConfig;
use crate::llms::LlmClient;
use crate::rag::rrf::fuse;
use crate::rag::synonyms::expand_to_tsquery;
use crate::rag::types::{EffectiveQuota, RetrievedPassage, SourceDebug};
use crate::template;

/// Everything the executor needs after retrieval: the resolved prompt and
/// system strings (placeholders substituted or stripped) plus the debug
/// trail attached to history records, never forwarded to the model.
#[derive(Debug, Clone, Default)]
pub struct RagOutcome {
    pub prompt: String,
    pub system: String,
    pub debug: HashMap<String, SourceDebug>,
    pub used: bool,
}

struct Row {
    id: Uuid,
    text: String,
    source_label: String,
    similarity: Option<f64>,
    rank: Option<f64>,
}

/// Default per-source quota.
fn effective_quota(config: &AgentConfig, index: usize, n_sources: usize) -> EffectiveQuota {
    if let Some(cfg) = config.source_config.get(&config.rag_sources[index]) {
        let default_top_k = default_top_k(index, n_sources, config.rag_top_k);
        let default_threshold = default_threshold(index, config.rag_threshold);
        return EffectiveQuota {
            top_k: cfg.top_k.unwrap_or(default_top_k),
            threshold: cfg.threshold.unwrap_or(default_threshold),
        };
    }
    EffectiveQuota {
        top_k: default_top_k(index, n_sources, config.rag_top_k),
        threshold: default_threshold(index, config.rag_threshold),
    }
}

fn default_top_k(index: usize, n_sources: usize, global_top_k: u32) -> u32 {
    if index == 0 {
        let reserved = 3 * (n_sources.saturating_sub(1)) as i64;
        ((global_top_k as i64 - reserved).max(1)) as u32
    } else {
        3
    }
}

fn default_threshold(index: usize, global_threshold: f64) -> f64 {
    if index == 0 {
        global_threshold
    } else {
        (global_threshold - 0.15_f64).max(0.15)
    }
}

/// The embedding query is the concatenation of variable *values*, falling
/// back to the resolved prompt only when every value is empty.
pub fn derive_query(vars: &HashMap<String, String>, resolved_prompt: &str) -> String {
    let values: Vec<&str> = vars
        .values()
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        resolved_prompt.to_string()
    } else {
        values.join(" ")
    }
}

fn embedding_literal(embedding: &[f32]) -> String {
    let parts: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

async fn semantic_search(
    pool: &PgPool,
    embedding: &str,
    source_label: &str,
    threshold: f64,
    limit: i64,
) -> sqlx::Result<Vec<Row>> {
    let rows = sqlx::query_as::<_, (Uuid, String, String, f64)>(
        r#"
        SELECT id, text, source_label, 1 - (embedding <=> CAST($1 AS vector)) AS similarity
        FROM kb_documents
        WHERE source_label = $2
          AND 1 - (embedding <=> CAST($1 AS vector)) >= $3
        ORDER BY similarity DESC
        LIMIT $4
        "#,
    )
    .bind(embedding)
    .bind(source_label)
    .bind(threshold)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, text, source_label, similarity)| Row {
            id,
            text,
            source_label,
            similarity: Some(similarity),
            rank: None,
        })
        .collect())
}

async fn lexical_search(
    pool: &PgPool,
    tsquery: &str,
    source_label: &str,
    limit: i64,
) -> sqlx::Result<Vec<Row>> {
    let rows = sqlx::query_as::<_, (Uuid, String, String, f64)>(
        r#"
        SELECT id, text, source_label, ts_rank_cd(search_vector, to_tsquery('simple', $1)) AS rank
        FROM kb_documents
        WHERE source_label = $2
          AND search_vector @@ to_tsquery('simple', $1)
        ORDER BY rank DESC
        LIMIT $3
        "#,
    )
    .bind(tsquery)
    .bind(source_label)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, text, source_label, rank)| Row {
            id,
            text,
            source_label,
            similarity: None,
            rank: Some(rank),
        })
        .collect())
}

/// Hybrid search over one source: semantic + lexical, fused by RRF.
/// Falls back to semantic-only when the synonym-expanded query is empty
/// (no usable lexical terms).
async fn search_one_source(
    pool: &PgPool,
    embedding: &str,
    keyword_query: &str,
    source_label: &str,
    quota: EffectiveQuota,
) -> (Vec<RetrievedPassage>, usize) {
    let n = (3 * quota.top_k) as i64;

    let semantic = semantic_search(pool, embedding, source_label, quota.threshold, n)
        .await
        .unwrap_or_default();

    let tsquery = expand_to_tsquery(keyword_query);
    let lexical = if tsquery.is_empty() {
        Vec::new()
    } else {
        lexical_search(pool, &tsquery, source_label, n)
            .await
            .unwrap_or_default()
    };

    let mut rows: HashMap<String, Row> = HashMap::new();
    let semantic_ids: Vec<String> = semantic
        .into_iter()
        .map(|r| {
            let id = r.id.to_string();
            rows.insert(id.clone(), r);
            id
        })
        .collect();
    let lexical_ids: Vec<String> = lexical
        .into_iter()
        .map(|r| {
            let id = r.id.to_string();
            rows.entry(id.clone()).or_insert(r);
            id
        })
        .collect();

    let fused = fuse(&semantic_ids, &lexical_ids);
    let total_candidates = rows.len();

    let passages: Vec<RetrievedPassage> = fused
        .into_iter()
        .take(quota.top_k as usize)
        .filter_map(|(id, score)| {
            let row = rows.remove(&id)?;
            Some(RetrievedPassage {
                id: row.id,
                text: row.text,
                source_label: row.source_label,
                similarity: row.similarity,
                bm25_rank: row.rank,
                rrf_score: score,
            })
        })
        .collect();

    (passages, total_candidates)
}

/// Locate the alias placeholder for a source and substitute the joined
/// passages, or drop the placeholder if absent.
fn inject_per_source(
    mut prompt: String,
    mut system: String,
    config: &AgentConfig,
    by_source: &HashMap<String, Vec<RetrievedPassage>>,
) -> (String, String, bool) {
    let mut any_substitution = false;
    for source in &config.rag_sources {
        let alias = config.alias_for(source);
        let token = format!("{{{{{alias}}}}}");
        let passages = by_source.get(source).cloned().unwrap_or_default();
        let joined = passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        let mut substituted = false;
        if prompt.contains(&token) {
            prompt = prompt.replace(&token, &joined);
            substituted = true;
        }
        if system.contains(&token) {
            system = system.replace(&token, &joined);
            substituted = true;
        }
        any_substitution |= substituted;
    }
    (prompt, system, any_substitution)
}

/// Full retrieval + injection pipeline, end to end. Failures are swallowed:
/// on any error the caller gets the input prompt/system back with
/// placeholders stripped, never a propagated error.
pub async fn retrieve_and_inject(
    pool: &PgPool,
    llm: &LlmClient,
    embed_model: &str,
    config: &AgentConfig,
    vars: &HashMap<String, String>,
    resolved_prompt: String,
    resolved_system: String,
) -> RagOutcome {
    let reserved = config.reserved_names();

    if !config.rag_enabled || config.rag_sources.is_empty() {
        let prompt = template::strip_placeholders(&resolved_prompt, &reserved);
        let system = template::strip_placeholders(&resolved_system, &reserved);
        return RagOutcome {
            prompt,
            system,
            debug: HashMap::new(),
            used: false,
        };
    }

    let query = derive_query(vars, &resolved_prompt);

    let embedding = match llm.embed(embed_model, &query).await {
        Ok(e) if !e.is_empty() => e,
        _ => {
            tracing::warn!(agent = %config.name, "retrieval embedding failed or empty; proceeding without context");
            let prompt = template::strip_placeholders(&resolved_prompt, &reserved);
            let system = template::strip_placeholders(&resolved_system, &reserved);
            return RagOutcome {
                prompt,
                system,
                debug: HashMap::new(),
                used: false,
            };
        }
    };

    let mut by_source: HashMap<String, Vec<RetrievedPassage>> = HashMap::new();
    let mut debug = HashMap::new();
    let mut all_passages: Vec<RetrievedPassage> = Vec::new();
    let mut seen_prefixes: HashSet<String> = HashSet::new();

    let n_sources = config.rag_sources.len();
    for (index, source) in config.rag_sources.iter().enumerate() {
        let quota = effective_quota(config, index, n_sources);
        let embedding_str = embedding_literal(&embedding);
        let (passages, _) =
            search_one_source(pool, &embedding_str, &query, source, quota).await;

        let sample: Vec<RetrievedPassage> = passages.iter().take(5).cloned().collect();
        debug.insert(
            source.clone(),
            SourceDebug {
                count: 0,
                top_k: quota.top_k,
                threshold: quota.threshold,
                sample,
            },
        );

        let mut deduped = Vec::new();
        for passage in passages {
            let prefix: String = passage.text.chars().take(80).collect();
            if seen_prefixes.insert(prefix) {
                all_passages.push(passage.clone());
                deduped.push(passage);
            }
        }
        by_source.insert(source.clone(), deduped);
    }

    all_passages.truncate(config.rag_top_k as usize);
    let kept_ids: HashSet<Uuid> = all_passages.iter().map(|p| p.id).collect();
    for passages in by_source.values_mut() {
        passages.retain(|p| kept_ids.contains(&p.id));
    }

    for (source, passages) in &by_source {
        if let Some(d) = debug.get_mut(source) {
            d.count = passages.len();
        }
    }

    let (mut prompt, mut system, mut substituted) =
        inject_per_source(resolved_prompt, resolved_system, config, &by_source);

    // Legacy catch-all: {{context}} gets every retrieved passage across sources.
    let context_joined = all_passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");
    if prompt.contains("{{context}}") {
        prompt = prompt.replace("{{context}}", &context_joined);
        substituted = true;
    }
    if system.contains("{{context}}") {
        system = system.replace("{{context}}", &context_joined);
        substituted = true;
    }

    if !substituted && !all_passages.is_empty() {
        system.push_str(&format!("\n\n[Retrieved Context]\n{context_joined}"));
    }

    prompt = template::strip_placeholders(&prompt, &reserved);
    system = template::strip_placeholders(&system, &reserved);

    RagOutcome {
        prompt,
        system,
        debug,
        used: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_quota_reserves_slots_for_secondaries() {
        assert_eq!(default_top_k(0, 3, 12), 6); // 12 - 3*2
        assert_eq!(default_top_k(0, 1, 12), 12);
        assert_eq!(default_top_k(0, 10, 5), 1); // floored at 1
    }

    #[test]
    fn secondary_quota_is_fixed() {
        assert_eq!(default_top_k(1, 3, 12), 3);
        assert_eq!(default_top_k(2, 3, 12), 3);
    }

    #[test]
    fn secondary_threshold_floors_at_point_fifteen() {
        assert_eq!(default_threshold(1, 0.3), 0.15);
        assert_eq!(default_threshold(1, 0.2), 0.15);
        assert_eq!(default_threshold(1, 0.5), 0.35);
    }

    #[test]
    fn derive_query_prefers_values_over_prompt() {
        let vars = HashMap::from([("city".to_string(), "Ankara".to_string())]);
        assert_eq!(derive_query(&vars, "Tell me about {{city}}"), "Ankara");
    }

    #[test]
    fn derive_query_falls_back_to_prompt_when_all_values_empty() {
        let vars = HashMap::from([("city".to_string(), "".to_string())]);
        assert_eq!(derive_query(&vars, "fallback prompt"), "fallback prompt");
    }
}

