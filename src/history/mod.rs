//! Run History Sink (C6).
//!
//! Corresponds to `kb-service/agent_executor.py::get_history_payload`.
//! Every write happens on its own pool checkout via a detached task, so a
//! slow or failing audit write never delays the response stream — failures
//! are logged and dropped, never surfaced to the caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct HistoryRecord {
    pub method: String,
    pub endpoint: String,
    pub model: String,
    pub duration_ms: i64,
    pub status: i32,
    pub request_payload: Value,
    pub response_payload: Value,
    pub workflow_id: Option<Uuid>,
    pub workflow_name: Option<String>,
    pub step_index: Option<i32>,
}

/// First 150 characters of the response text (`preview`).
fn preview(response_payload: &Value) -> String {
    response_payload
        .get("text")
        .and_then(Value::as_str)
        .map(|t| t.chars().take(150).collect())
        .unwrap_or_default()
}

/// Fire-and-forget a history write. `pool` is cloned (cheap — an `Arc`
/// internally) so the insert runs on a connection the caller's own request
/// handling never blocks on.
pub async fn record(pool: &PgPool, record: HistoryRecord) {
    let pool = pool.clone();
    tokio::spawn(async move {
        if let Err(e) = insert(&pool, &record).await {
            tracing::warn!(error = %e, endpoint = %record.endpoint, "history write failed, dropping");
        }
    });
}

async fn insert(pool: &PgPool, record: &HistoryRecord) -> sqlx::Result<()> {
    let id = Uuid::new_v4();
    let preview_text = preview(&record.response_payload);
    sqlx::query(
        r#"
        INSERT INTO request_history
            (id, method, endpoint, model, duration_ms, status, preview,
             request_payload, response_payload, workflow_id, workflow_name, step_index, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now())
        "#,
    )
    .bind(id)
    .bind(&record.method)
    .bind(&record.endpoint)
    .bind(&record.model)
    .bind(record.duration_ms)
    .bind(record.status)
    .bind(&preview_text)
    .bind(&record.request_payload)
    .bind(&record.response_payload)
    .bind(record.workflow_id)
    .bind(&record.workflow_name)
    .bind(record.step_index)
    .execute(pool)
    .await?;
    Ok(())
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct HistoryItem {
    pub id: Uuid,
    pub method: String,
    pub endpoint: String,
    pub model: String,
    pub duration_ms: i64,
    pub status: i32,
    pub preview: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct HistoryItemDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub item: HistoryItem,
    pub request_payload: Option<Value>,
    pub response_payload: Option<Value>,
}

pub async fn list(pool: &PgPool, page: i64, limit: i64) -> sqlx::Result<(Vec<HistoryItem>, i64)> {
    let offset = (page.max(1) - 1) * limit;
    let rows = sqlx::query_as(
        "SELECT id, method, endpoint, model, duration_ms, status, preview, created_at \
         FROM request_history ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    let total: (i64,) = sqlx::query_as("SELECT count(*) FROM request_history").fetch_one(pool).await?;
    Ok((rows, total.0))
}

pub async fn get(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<HistoryItemDetail>> {
    sqlx::query_as(
        "SELECT id, method, endpoint, model, duration_ms, status, preview, created_at, \
                request_payload, response_payload \
         FROM request_history WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_to_150_chars() {
        let payload = serde_json::json!({"text": "x".repeat(200)});
        assert_eq!(preview(&payload).chars().count(), 150);
    }

    #[test]
    fn preview_is_empty_without_a_text_field() {
        assert_eq!(preview(&serde_json::json!({})), "");
    }
}
