//! Knowledge-base document CRUD (`main.py`'s document routes — implemented
//! plainly, no special design).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentInput {
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub source_label: String,
}

fn default_source() -> String {
    "manual".to_string()
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub text: String,
    pub source: String,
    pub source_label: String,
    pub created_at: DateTime<Utc>,
}

fn embedding_literal(embedding: &[f32]) -> String {
    let parts: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

/// Insert documents, skipping any whose `md5(text)` already exists
/// (the unique index on the text hash).
pub async fn add_documents(pool: &PgPool, docs: &[DocumentInput]) -> sqlx::Result<usize> {
    let mut inserted = 0usize;
    for doc in docs {
        let result = sqlx::query(
            r#"
            INSERT INTO kb_documents (text, embedding, source, source_label)
            VALUES ($1, CAST($2 AS vector), $3, $4)
            ON CONFLICT (md5(text)) DO NOTHING
            "#,
        )
        .bind(&doc.text)
        .bind(embedding_literal(&doc.embedding))
        .bind(&doc.source)
        .bind(&doc.source_label)
        .execute(pool)
        .await?;
        inserted += result.rows_affected() as usize;
    }
    Ok(inserted)
}

pub async fn list_documents(
    pool: &PgPool,
    page: i64,
    limit: i64,
) -> sqlx::Result<(Vec<DocumentResponse>, i64)> {
    let offset = (page.max(1) - 1) * limit;
    let rows: Vec<(Uuid, String, String, String, DateTime<Utc>)> = sqlx::query_as(
        "SELECT id, text, source, source_label, created_at FROM kb_documents \
         ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT count(*) FROM kb_documents").fetch_one(pool).await?;

    let data = rows
        .into_iter()
        .map(|(id, text, source, source_label, created_at)| DocumentResponse {
            id,
            text,
            source,
            source_label,
            created_at,
        })
        .collect();
    Ok((data, total.0))
}

pub async fn delete_document(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM kb_documents WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn bulk_delete(pool: &PgPool, ids: &[Uuid]) -> sqlx::Result<usize> {
    let result = sqlx::query("DELETE FROM kb_documents WHERE id = ANY($1)")
        .bind(ids)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() as usize)
}

#[derive(Debug, Serialize)]
pub struct SearchResultItem {
    pub id: Uuid,
    pub text: String,
    pub source: String,
    pub source_label: String,
    pub similarity: f64,
    pub created_at: DateTime<Utc>,
}

/// Direct embedding-vector search (the caller has already embedded their
/// query) — distinct from the `kb_search` tool, which embeds internally.
pub async fn search_documents(
    pool: &PgPool,
    embedding: &[f32],
    top_k: i64,
    threshold: f64,
    sources: Option<&[String]>,
) -> sqlx::Result<Vec<SearchResultItem>> {
    let embedding_str = embedding_literal(embedding);

    let rows: Vec<(Uuid, String, String, String, f64, DateTime<Utc>)> = if let Some(sources) = sources.filter(|s| !s.is_empty()) {
        sqlx::query_as(
            r#"
            SELECT id, text, source, source_label,
                   1 - (embedding <=> CAST($1 AS vector)) AS similarity, created_at
            FROM kb_documents
            WHERE source_label = ANY($2)
              AND 1 - (embedding <=> CAST($1 AS vector)) >= $3
            ORDER BY similarity DESC
            LIMIT $4
            "#,
        )
        .bind(&embedding_str)
        .bind(sources)
        .bind(threshold)
        .bind(top_k)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as(
            r#"
            SELECT id, text, source, source_label,
                   1 - (embedding <=> CAST($1 AS vector)) AS similarity, created_at
            FROM kb_documents
            WHERE 1 - (embedding <=> CAST($1 AS vector)) >= $2
            ORDER BY similarity DESC
            LIMIT $3
            "#,
        )
        .bind(&embedding_str)
        .bind(threshold)
        .bind(top_k)
        .fetch_all(pool)
        .await?
    };

    Ok(rows
        .into_iter()
        .map(|(id, text, source, source_label, similarity, created_at)| SearchResultItem {
            id,
            text,
            source,
            source_label,
            similarity,
            created_at,
        })
        .collect())
}

#[derive(Debug, Serialize)]
pub struct Stats {
    pub total: i64,
    pub sources: std::collections::HashMap<String, i64>,
    pub source_labels: Vec<String>,
}

pub async fn stats(pool: &PgPool) -> sqlx::Result<Stats> {
    let total: (i64,) = sqlx::query_as("SELECT count(*) FROM kb_documents").fetch_one(pool).await?;
    let by_source: Vec<(String, i64)> =
        sqlx::query_as("SELECT source, count(*) FROM kb_documents GROUP BY source").fetch_all(pool).await?;
    let labels: Vec<(String,)> =
        sqlx::query_as("SELECT DISTINCT source_label FROM kb_documents ORDER BY source_label").fetch_all(pool).await?;

    Ok(Stats {
        total: total.0,
        sources: by_source.into_iter().collect(),
        source_labels: labels.into_iter().map(|(l,)| l).collect(),
    })
}

pub async fn clear_all(pool: &PgPool) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM kb_documents").execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! require_pool {
        () => {
            match crate::db::test_pool().await {
                Some(p) => p,
                None => {
                    eprintln!("skipping: AGENTD_TEST_DATABASE_URL not set");
                    return;
                }
            }
        };
    }

    fn fake_embedding(seed: f32) -> Vec<f32> {
        (0..768).map(|i| (seed + i as f32) % 1.0).collect()
    }

    #[tokio::test]
    async fn add_search_and_clear_roundtrip() {
        let pool = require_pool!();
        clear_all(&pool).await.unwrap();

        let doc = DocumentInput {
            text: format!("test document {}", Uuid::new_v4()),
            embedding: fake_embedding(0.1),
            source: "manual".to_string(),
            source_label: "unit-test".to_string(),
        };
        let inserted = add_documents(&pool, &[doc]).await.unwrap();
        assert_eq!(inserted, 1);

        let results = search_documents(&pool, &fake_embedding(0.1), 5, 0.0, None).await.unwrap();
        assert!(!results.is_empty());

        let stats = stats(&pool).await.unwrap();
        assert!(stats.total >= 1);

        let cleared = clear_all(&pool).await.unwrap();
        assert!(cleared >= 1);
    }

    #[tokio::test]
    async fn duplicate_text_is_ignored_on_conflict() {
        let pool = require_pool!();
        clear_all(&pool).await.unwrap();

        let text = format!("duplicate check {}", Uuid::new_v4());
        let doc = DocumentInput {
            text: text.clone(),
            embedding: fake_embedding(0.2),
            source: "manual".to_string(),
            source_label: String::new(),
        };
        let first = add_documents(&pool, &[doc.clone()]).await.unwrap();
        let second = add_documents(&pool, &[doc]).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 0);

        clear_all(&pool).await.unwrap();
    }
}
