//! Idempotent schema migration (C9), run once at process startup.
//!
//! Corresponds to `kb-service/database.py::init_db`, generalized onto the
//! teacher's `PgStore::migrate` convention: `CREATE TABLE IF NOT EXISTS` /
//! `CREATE INDEX IF NOT EXISTS`, safe to run on every boot.

use sqlx::PgPool;

use crate::config::DEFAULT_SETTINGS;

pub async fn migrate(pool: &PgPool) -> sqlx::Result<()> {
    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector").execute(pool).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kb_documents (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            text TEXT NOT NULL,
            embedding vector(768) NOT NULL,
            source VARCHAR(20) NOT NULL DEFAULT 'manual',
            source_label VARCHAR(255) NOT NULL DEFAULT '',
            search_vector tsvector GENERATED ALWAYS AS (to_tsvector('simple', text)) STORED,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS kb_documents_text_md5_idx ON kb_documents (md5(text))",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS kb_documents_search_vector_idx ON kb_documents USING gin (search_vector)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS kb_documents_embedding_hnsw_idx ON kb_documents USING hnsw (embedding vector_cosine_ops)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS app_settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL DEFAULT '',
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;
    for (key, value) in DEFAULT_SETTINGS {
        sqlx::query("INSERT INTO app_settings (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING")
            .bind(key)
            .bind(value)
            .execute(pool)
            .await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS request_history (
            id UUID PRIMARY KEY,
            method TEXT NOT NULL,
            endpoint TEXT NOT NULL,
            model TEXT NOT NULL DEFAULT '',
            duration_ms BIGINT NOT NULL DEFAULT 0,
            status INTEGER NOT NULL,
            preview TEXT NOT NULL DEFAULT '',
            request_payload JSONB,
            response_payload JSONB,
            workflow_id UUID,
            workflow_name TEXT,
            step_index INTEGER,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS request_history_created_at_idx ON request_history (created_at DESC)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS datasets (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL,
            url TEXT NOT NULL DEFAULT '',
            method TEXT NOT NULL DEFAULT 'GET',
            token TEXT NOT NULL DEFAULT '',
            headers JSONB NOT NULL DEFAULT '{}'::jsonb,
            array_path TEXT NOT NULL DEFAULT '',
            extract_fields JSONB NOT NULL DEFAULT '[]'::jsonb,
            raw_data JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dataset_records (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            dataset_id UUID NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
            data JSONB NOT NULL,
            json_path TEXT NOT NULL DEFAULT '$',
            label TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS dataset_records_dedup_idx ON dataset_records (dataset_id, md5(data::text))",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS saved_agents (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            config JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS workflows (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            steps JSONB NOT NULL DEFAULT '[]'::jsonb,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("schema migrated");
    Ok(())
}
