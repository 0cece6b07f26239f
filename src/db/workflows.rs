//! Workflow CRUD — `workflows.steps` stores `Vec<`[`WorkflowStep`]`>` as
//! JSONB, grounded on `kb-service/models.py`'s `WorkflowCreate`/
//! `WorkflowUpdate`/`WorkflowResponse` shapes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::workflow::WorkflowStep;

#[derive(Debug, Serialize)]
pub struct WorkflowRecord {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub steps: Vec<WorkflowStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn from_row(row: (Uuid, String, String, Json<Vec<WorkflowStep>>, DateTime<Utc>, DateTime<Utc>)) -> WorkflowRecord {
    let (id, name, description, Json(steps), created_at, updated_at) = row;
    WorkflowRecord { id, name, description, steps, created_at, updated_at }
}

pub async fn create(pool: &PgPool, name: &str, description: &str, steps: &[WorkflowStep]) -> sqlx::Result<WorkflowRecord> {
    let row: (Uuid, String, String, Json<Vec<WorkflowStep>>, DateTime<Utc>, DateTime<Utc>) = sqlx::query_as(
        r#"
        INSERT INTO workflows (name, description, steps)
        VALUES ($1, $2, $3)
        RETURNING id, name, description, steps, created_at, updated_at
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(Json(steps))
    .fetch_one(pool)
    .await?;
    Ok(from_row(row))
}

pub async fn list(pool: &PgPool) -> sqlx::Result<Vec<WorkflowRecord>> {
    let rows: Vec<(Uuid, String, String, Json<Vec<WorkflowStep>>, DateTime<Utc>, DateTime<Utc>)> =
        sqlx::query_as("SELECT id, name, description, steps, created_at, updated_at FROM workflows ORDER BY created_at DESC")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(from_row).collect())
}

pub async fn get(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<WorkflowRecord>> {
    let row: Option<(Uuid, String, String, Json<Vec<WorkflowStep>>, DateTime<Utc>, DateTime<Utc>)> =
        sqlx::query_as("SELECT id, name, description, steps, created_at, updated_at FROM workflows WHERE id = $1")
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
    steps: Option<&[WorkflowStep]>,
) -> sqlx::Result<Option<WorkflowRecord>> {
    let Some(existing) = get(pool, id).await? else {
        return Ok(None);
    };
    let name = name.unwrap_or(&existing.name);
    let description = description.unwrap_or(&existing.description);
    let steps = steps.unwrap_or(&existing.steps);

    let row: Option<(Uuid, String, String, Json<Vec<WorkflowStep>>, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
        r#"
        UPDATE workflows
        SET name = $2, description = $3, steps = $4, updated_at = now()
        WHERE id = $1
        RETURNING id, name, description, steps, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(Json(steps))
    .fetch_optional(pool)
    .await?;
    Ok(row.map(from_row))
}

pub async fn delete(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM workflows WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// Loads a [`WorkflowRecord`] and turns it into the runnable
/// [`crate::workflow::Workflow`] shape.
pub async fn load_runnable(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<crate::workflow::Workflow>> {
    Ok(get(pool, id).await?.map(|record| crate::workflow::Workflow {
        id: record.id,
        name: record.name,
        description: record.description,
        steps: record.steps,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

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

    fn fake_steps() -> Vec<WorkflowStep> {
        vec![WorkflowStep {
            id: "step-1".to_string(),
            agent_id: Uuid::new_v4(),
            variable_mappings: HashMap::from([("topic".to_string(), "input:topic".to_string())]),
        }]
    }

    #[tokio::test]
    async fn create_load_runnable_and_delete_roundtrip() {
        let pool = require_pool!();

        let created = create(&pool, "test-workflow", "a test workflow", &fake_steps()).await.unwrap();
        assert_eq!(created.steps.len(), 1);

        let runnable = load_runnable(&pool, created.id).await.unwrap().expect("workflow exists");
        assert_eq!(runnable.id, created.id);
        assert_eq!(runnable.steps[0].id, "step-1");

        let updated = update(&pool, created.id, Some("renamed"), None, None)
            .await
            .unwrap()
            .expect("workflow still exists");
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.steps.len(), 1);

        assert!(delete(&pool, created.id).await.unwrap());
        assert!(get(&pool, created.id).await.unwrap().is_none());
    }
}
