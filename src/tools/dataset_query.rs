//! `dataset_query` — browse and search saved dataset records.
//!
//! Corresponds to `kb-service/tools/dataset_query.py`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use super::{AgentTool, ToolContext};
use crate::llms::ToolSchema;

pub struct DatasetQueryTool;

#[derive(Deserialize, Default)]
struct Args {
    dataset_id: Option<Uuid>,
    #[serde(default)]
    search_text: String,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    10
}

#[async_trait]
impl AgentTool for DatasetQueryTool {
    fn name(&self) -> &'static str {
        "dataset_query"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "dataset_query",
            "Search and query saved dataset records. Use this to find specific data from \
             previously saved datasets, filter records, or retrieve structured information.",
            json!({
                "type": "object",
                "properties": {
                    "dataset_id": {
                        "type": "string",
                        "description": "UUID of the dataset to query. If not specified, searches across all datasets."
                    },
                    "search_text": {
                        "type": "string",
                        "description": "Text to search for within record data (case-insensitive substring match)"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of records to return (default: 10)",
                        "default": 10
                    }
                },
                "required": []
            }),
        )
    }

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> String {
        let args: Args = serde_json::from_value(args).unwrap_or_default();
        let limit = args.limit.clamp(1, 50);

        if args.dataset_id.is_none() && args.search_text.is_empty() {
            return match list_datasets(ctx.pool).await {
                Ok(rows) if rows.is_empty() => {
                    "No datasets found. Save some data from the Datasets page first.".to_string()
                }
                Ok(rows) => {
                    let mut parts = vec!["Available datasets:\n".to_string()];
                    for (name, id, count) in rows {
                        parts.push(format!("  - {name} (id: {id}, records: {count})"));
                    }
                    parts.join("\n")
                }
                Err(e) => format!("Dataset query error: {e}"),
            };
        }

        match search_records(ctx.pool, args.dataset_id, &args.search_text, limit).await {
            Ok(rows) if rows.is_empty() => "No records found matching the criteria.".to_string(),
            Ok(rows) => format_records(&rows),
            Err(e) => format!("Dataset query error: {e}"),
        }
    }
}

async fn list_datasets(pool: &PgPool) -> sqlx::Result<Vec<(String, Uuid, i64)>> {
    sqlx::query_as(
        r#"
        SELECT d.name, d.id, (SELECT COUNT(*) FROM dataset_records WHERE dataset_id = d.id)
        FROM datasets d
        ORDER BY d.updated_at DESC
        LIMIT 20
        "#,
    )
    .fetch_all(pool)
    .await
}

struct Record {
    dataset_name: Option<String>,
    data: serde_json::Value,
    label: Option<String>,
}

async fn search_records(
    pool: &PgPool,
    dataset_id: Option<Uuid>,
    search_text: &str,
    limit: i64,
) -> sqlx::Result<Vec<Record>> {
    let like = if search_text.is_empty() {
        None
    } else {
        Some(format!("%{search_text}%"))
    };

    let rows: Vec<(Option<String>, serde_json::Value, Option<String>)> = sqlx::query_as(
        r#"
        SELECT d.name, dr.data, dr.label
        FROM dataset_records dr
        LEFT JOIN datasets d ON d.id = dr.dataset_id
        WHERE ($1::uuid IS NULL OR dr.dataset_id = $1)
          AND ($2::text IS NULL OR dr.data::text ILIKE $2)
        ORDER BY dr.created_at DESC
        LIMIT $3
        "#,
    )
    .bind(dataset_id)
    .bind(&like)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(dataset_name, data, label)| Record {
            dataset_name,
            data,
            label,
        })
        .collect())
}

fn format_records(rows: &[Record]) -> String {
    let mut parts = vec![format!("Found {} record(s):\n", rows.len())];
    for (i, row) in rows.iter().enumerate() {
        let mut data_str = serde_json::to_string(&row.data).unwrap_or_default();
        if data_str.chars().count() > 500 {
            data_str = data_str.chars().take(500).collect::<String>() + "...";
        }
        let label = row
            .label
            .as_ref()
            .map(|l| format!(" [{l}]"))
            .unwrap_or_default();
        let dataset_name = row.dataset_name.as_deref().unwrap_or("unknown");
        parts.push(format!("--- Record {} (dataset: {dataset_name}){label} ---", i + 1));
        parts.push(data_str);
        parts.push(String::new());
    }
    parts.join("\n")
}
