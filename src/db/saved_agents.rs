//! Saved-agent CRUD — `saved_agents.config` stores the full [`AgentConfig`]
//! as JSONB, grounded on `kb-service/models.py`'s `AgentCreate`/`AgentUpdate`/
//! `AgentResponse` shapes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::agent::AgentConfig;

#[derive(Debug, Serialize)]
pub struct AgentRecord {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub config: AgentConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn from_row(row: (Uuid, String, String, Json<AgentConfig>, DateTime<Utc>, DateTime<Utc>)) -> AgentRecord {
    let (id, name, description, Json(config), created_at, updated_at) = row;
    AgentRecord { id, name, description, config, created_at, updated_at }
}

pub async fn create(pool: &PgPool, name: &str, description: &str, config: &AgentConfig) -> sqlx::Result<AgentRecord> {
    let row: (Uuid, String, String, Json<AgentConfig>, DateTime<Utc>, DateTime<Utc>) = sqlx::query_as(
        r#"
        INSERT INTO saved_agents (name, description, config)
        VALUES ($1, $2, $3)
        RETURNING id, name, description, config, created_at, updated_at
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(Json(config))
    .fetch_one(pool)
    .await?;
    Ok(from_row(row))
}

pub async fn list(pool: &PgPool) -> sqlx::Result<Vec<AgentRecord>> {
    let rows: Vec<(Uuid, String, String, Json<AgentConfig>, DateTime<Utc>, DateTime<Utc>)> =
        sqlx::query_as("SELECT id, name, description, config, created_at, updated_at FROM saved_agents ORDER BY created_at DESC")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(from_row).collect())
}

pub async fn get(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<AgentRecord>> {
    let row: Option<(Uuid, String, String, Json<AgentConfig>, DateTime<Utc>, DateTime<Utc>)> =
        sqlx::query_as("SELECT id, name, description, config, created_at, updated_at FROM saved_agents WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(from_row))
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    name: Option<&str>,
    description: Option<&str>,
    config: Option<&AgentConfig>,
) -> sqlx::Result<Option<AgentRecord>> {
    let Some(existing) = get(pool, id).await? else {
        return Ok(None);
    };
    let name = name.unwrap_or(&existing.name);
    let description = description.unwrap_or(&existing.description);
    let config = config.unwrap_or(&existing.config);

    let row: Option<(Uuid, String, String, Json<AgentConfig>, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
        r#"
        UPDATE saved_agents
        SET name = $2, description = $3, config = $4, updated_at = now()
        WHERE id = $1
        RETURNING id, name, description, config, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(Json(config))
    .fetch_optional(pool)
    .await?;
    Ok(row.map(from_row))
}

pub async fn delete(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM saved_agents WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// Available tools reported to the UI (`GET /api/agents/tools`), grounded on
/// `kb-service/models.py::AgentToolsResponse`.
pub fn available_tools() -> Vec<crate::llms::ToolSchema> {
    crate::tools::all_schemas()
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

    fn fake_config() -> AgentConfig {
        serde_json::from_value(serde_json::json!({
            "name": "test-agent",
            "model": "test-model",
            "prompt_template": "Say hello to {{name}}",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn create_update_and_delete_roundtrip() {
        let pool = require_pool!();

        let created = create(&pool, "test-agent", "a test agent", &fake_config()).await.unwrap();
        assert_eq!(created.name, "test-agent");
        assert_eq!(created.config.model, "test-model");

        let mut changed_config = fake_config();
        changed_config.model = "other-model".to_string();
        let updated = update(&pool, created.id, None, None, Some(&changed_config))
            .await
            .unwrap()
            .expect("agent still exists");
        assert_eq!(updated.name, created.name);
        assert_eq!(updated.config.model, "other-model");

        assert!(delete(&pool, created.id).await.unwrap());
        assert!(get(&pool, created.id).await.unwrap().is_none());
    }

    #[test]
    fn available_tools_is_non_empty() {
        assert!(!available_tools().is_empty());
    }
}
