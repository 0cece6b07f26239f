//! Dataset CRUD. Fetch execution itself (the HTTP fetch-and-extract
//! pipeline) is out of scope — these are contracts-only storage operations,
//! grounded on `kb-service/models.py`'s `Dataset*` and `DatasetRecord*`
//! shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct DatasetCreate {
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub headers: Value,
    #[serde(default)]
    pub array_path: String,
    #[serde(default)]
    pub extract_fields: Value,
    #[serde(default)]
    pub raw_data: Option<Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Deserialize, Default)]
pub struct DatasetUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub token: Option<String>,
    pub headers: Option<Value>,
    pub array_path: Option<String>,
    pub extract_fields: Option<Value>,
    pub raw_data: Option<Value>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DatasetResponse {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub method: String,
    pub token: String,
    pub headers: Value,
    pub array_path: String,
    pub extract_fields: Value,
    pub raw_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str =
    "id, name, url, method, token, headers, array_path, extract_fields, raw_data, created_at, updated_at";

pub async fn create(pool: &PgPool, input: &DatasetCreate) -> sqlx::Result<DatasetResponse> {
    sqlx::query_as(&format!(
        "INSERT INTO datasets (name, url, method, token, headers, array_path, extract_fields, raw_data) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {COLUMNS}"
    ))
    .bind(&input.name)
    .bind(&input.url)
    .bind(&input.method)
    .bind(&input.token)
    .bind(&input.headers)
    .bind(&input.array_path)
    .bind(&input.extract_fields)
    .bind(&input.raw_data)
    .fetch_one(pool)
    .await
}

pub async fn list(pool: &PgPool) -> sqlx::Result<Vec<DatasetResponse>> {
    sqlx::query_as(&format!("SELECT {COLUMNS} FROM datasets ORDER BY created_at DESC"))
        .fetch_all(pool)
        .await
}

pub async fn get(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<DatasetResponse>> {
    sqlx::query_as(&format!("SELECT {COLUMNS} FROM datasets WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update(pool: &PgPool, id: Uuid, input: &DatasetUpdate) -> sqlx::Result<Option<DatasetResponse>> {
    let Some(existing) = get(pool, id).await? else {
        return Ok(None);
    };
    let name = input.name.clone().unwrap_or(existing.name);
    let url = input.url.clone().unwrap_or(existing.url);
    let method = input.method.clone().unwrap_or(existing.method);
    let token = input.token.clone().unwrap_or(existing.token);
    let headers = input.headers.clone().unwrap_or(existing.headers);
    let array_path = input.array_path.clone().unwrap_or(existing.array_path);
    let extract_fields = input.extract_fields.clone().unwrap_or(existing.extract_fields);
    let raw_data = input.raw_data.clone().or(existing.raw_data);

    sqlx::query_as(&format!(
        "UPDATE datasets SET name = $2, url = $3, method = $4, token = $5, headers = $6, array_path = $7, \
         extract_fields = $8, raw_data = $9, updated_at = now() WHERE id = $1 RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(url)
    .bind(method)
    .bind(token)
    .bind(headers)
    .bind(array_path)
    .bind(extract_fields)
    .bind(raw_data)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM datasets WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Deserialize)]
pub struct DatasetRecordCreate {
    pub data: Value,
    #[serde(default = "default_json_path")]
    pub json_path: String,
    #[serde(default)]
    pub label: String,
}

fn default_json_path() -> String {
    "$".to_string()
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DatasetRecordResponse {
    pub id: Uuid,
    pub dataset_id: Uuid,
    pub data: Value,
    pub json_path: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

/// Inserts records for a dataset, skipping exact-content duplicates
/// (`(dataset_id, md5(data))` unique index).
pub async fn add_records(
    pool: &PgPool,
    dataset_id: Uuid,
    records: &[DatasetRecordCreate],
) -> sqlx::Result<usize> {
    let mut inserted = 0usize;
    for record in records {
        let result = sqlx::query(
            r#"
            INSERT INTO dataset_records (dataset_id, data, json_path, label)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (dataset_id, md5(data::text)) DO NOTHING
            "#,
        )
        .bind(dataset_id)
        .bind(&record.data)
        .bind(&record.json_path)
        .bind(&record.label)
        .execute(pool)
        .await?;
        inserted += result.rows_affected() as usize;
    }
    Ok(inserted)
}

pub async fn list_records(pool: &PgPool, dataset_id: Uuid) -> sqlx::Result<Vec<DatasetRecordResponse>> {
    sqlx::query_as(
        "SELECT id, dataset_id, data, json_path, label, created_at FROM dataset_records \
         WHERE dataset_id = $1 ORDER BY created_at DESC",
    )
    .bind(dataset_id)
    .fetch_all(pool)
    .await
}

pub async fn delete_record(pool: &PgPool, dataset_id: Uuid, record_id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM dataset_records WHERE id = $1 AND dataset_id = $2")
        .bind(record_id)
        .bind(dataset_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
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

    #[tokio::test]
    async fn create_update_and_delete_roundtrip() {
        let pool = require_pool!();

        let created = create(
            &pool,
            &DatasetCreate {
                name: format!("test-dataset-{}", Uuid::new_v4()),
                url: "https://example.com/api".to_string(),
                method: "GET".to_string(),
                token: String::new(),
                headers: Value::Null,
                array_path: "$.items".to_string(),
                extract_fields: Value::Null,
                raw_data: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(created.method, "GET");
        assert!(created.raw_data.is_none());

        let updated = update(
            &pool,
            created.id,
            &DatasetUpdate { raw_data: Some(serde_json::json!({"cached": true})), ..Default::default() },
        )
        .await
        .unwrap()
        .expect("dataset still exists");
        assert_eq!(updated.name, created.name);
        assert_eq!(updated.raw_data, Some(serde_json::json!({"cached": true})));

        let record = DatasetRecordCreate {
            data: serde_json::json!({"k": "v"}),
            json_path: "$".to_string(),
            label: "row-1".to_string(),
        };
        let added = add_records(&pool, created.id, &[record]).await.unwrap();
        assert_eq!(added, 1);

        let records = list_records(&pool, created.id).await.unwrap();
        assert_eq!(records.len(), 1);

        assert!(delete(&pool, created.id).await.unwrap());
        assert!(get(&pool, created.id).await.unwrap().is_none());
    }
}
