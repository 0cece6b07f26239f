//! `kb_search` — semantic search over `kb_documents`.
//!
//! Corresponds to `kb-service/tools/kb_search.py`. Unlike the retrieval
//! engine (C2), this is a direct cosine-similarity query with no RRF or
//! per-source quota defaulting — the model chooses its own `top_k` and
//! `threshold`, scoped to this single tool call rather than a whole agent
//! turn.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;

use super::{AgentTool, ToolContext};
use crate::llms::ToolSchema;

pub struct KbSearchTool;

#[derive(Deserialize)]
struct Args {
    query: String,
    #[serde(default = "default_top_k")]
    top_k: i64,
    #[serde(default = "default_threshold")]
    threshold: f64,
    #[serde(default)]
    sources: Vec<String>,
}

fn default_top_k() -> i64 {
    5
}
fn default_threshold() -> f64 {
    0.3
}

#[async_trait]
impl AgentTool for KbSearchTool {
    fn name(&self) -> &'static str {
        "kb_search"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "kb_search",
            "Search the Knowledge Base for relevant documents using semantic similarity. \
             Use this when you need to find information from stored documents, manuals, or \
             any previously indexed content.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query to find relevant documents"
                    },
                    "top_k": {
                        "type": "integer",
                        "description": "Maximum number of results to return (default: 5)",
                        "default": 5
                    },
                    "threshold": {
                        "type": "number",
                        "description": "Minimum similarity threshold 0-1 (default: 0.3)",
                        "default": 0.3
                    },
                    "sources": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Optional list of source labels to filter results"
                    }
                },
                "required": ["query"]
            }),
        )
    }

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> String {
        let args: Args = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(_) => return "Error: query is required".to_string(),
        };
        if args.query.trim().is_empty() {
            return "Error: query is required".to_string();
        }

        let embedding = match ctx.llm.embed(ctx.embed_model, &args.query).await {
            Ok(e) => e,
            Err(e) => return format!("KB search error: {e}"),
        };

        match search(ctx.pool, &embedding, args.top_k, args.threshold, &args.sources).await {
            Ok(rows) if rows.is_empty() => format!(
                "No documents found matching '{}' with threshold >= {}",
                args.query, args.threshold
            ),
            Ok(rows) => format_results(&rows),
            Err(e) => format!("KB search error: {e}"),
        }
    }
}

struct Row {
    text: String,
    source_label: String,
    similarity: f64,
}

async fn search(
    pool: &PgPool,
    embedding: &[f32],
    top_k: i64,
    threshold: f64,
    sources: &[String],
) -> sqlx::Result<Vec<Row>> {
    let literal = format!(
        "[{}]",
        embedding.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
    );

    let rows = if sources.is_empty() {
        sqlx::query_as::<_, (String, String, f64)>(
            r#"
            SELECT text, source_label, 1 - (embedding <=> CAST($1 AS vector)) AS similarity
            FROM kb_documents
            WHERE 1 - (embedding <=> CAST($1 AS vector)) >= $2
            ORDER BY similarity DESC
            LIMIT $3
            "#,
        )
        .bind(&literal)
        .bind(threshold)
        .bind(top_k)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, (String, String, f64)>(
            r#"
            SELECT text, source_label, 1 - (embedding <=> CAST($1 AS vector)) AS similarity
            FROM kb_documents
            WHERE 1 - (embedding <=> CAST($1 AS vector)) >= $2
              AND source_label = ANY($4)
            ORDER BY similarity DESC
            LIMIT $3
            "#,
        )
        .bind(&literal)
        .bind(threshold)
        .bind(top_k)
        .bind(sources)
        .fetch_all(pool)
        .await?
    };

    Ok(rows
        .into_iter()
        .map(|(text, source_label, similarity)| Row {
            text,
            source_label,
            similarity,
        })
        .collect())
}

fn format_results(rows: &[Row]) -> String {
    let mut parts = vec![format!("Found {} relevant document(s):\n", rows.len())];
    for (i, row) in rows.iter().enumerate() {
        let source_info = if row.source_label.is_empty() {
            String::new()
        } else {
            format!(" [source: {}]", row.source_label)
        };
        parts.push(format!(
            "--- Result {} (similarity: {:.3}){} ---",
            i + 1,
            row.similarity,
            source_info
        ));
        parts.push(row.text.clone());
        parts.push(String::new());
    }
    parts.join("\n")
}
