//! Process configuration and read-through settings (C8).
//!
//! Two layers are consulted, in order: the process environment, then the
//! `app_settings` table. Settings are re-read from the database on every
//! call — there is no in-process cache — so an admin mutating a setting is
//! visible on the very next request.

use sqlx::PgPool;

/// Default settings seeded into `app_settings` on first migration.
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("chat_url", "http://localhost:8000/v1"),
    ("embed_url", "http://localhost:8001/v1"),
    ("chat_fallback_url", ""),
    ("embed_fallback_url", ""),
    ("api_key", ""),
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub database_url: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/agentd".to_string());
        Self { port, database_url }
    }
}

/// Resolve a backend URL by precedence: the first candidate that is
/// non-empty and not a relative proxy path wins.
pub fn resolve_url(primary: &str, fallback: &str, default: &str) -> String {
    for candidate in [primary, fallback, default] {
        if !candidate.is_empty() && !candidate.starts_with('/') {
            return candidate.to_string();
        }
    }
    default.to_string()
}

/// Read a single setting key from `app_settings`, falling back to an
/// environment variable, then to `default`.
pub async fn setting(pool: &PgPool, key: &str, env_var: &str, default: &str) -> String {
    if let Ok(v) = std::env::var(env_var) {
        if !v.is_empty() {
            return v;
        }
    }
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM app_settings WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
        .ok()
        .flatten();
    row.map(|(v,)| v).unwrap_or_else(|| default.to_string())
}

/// Resolve the chat-completions backend URL (primary + fallback settings).
pub async fn chat_url(pool: &PgPool) -> String {
    let primary = setting(pool, "chat_url", "AGENTD_CHAT_URL", "").await;
    let fallback = setting(pool, "chat_fallback_url", "AGENTD_CHAT_FALLBACK_URL", "").await;
    resolve_url(&primary, &fallback, "http://localhost:8000/v1")
}

/// Resolve the embedding backend URL (primary + fallback settings).
pub async fn embed_url(pool: &PgPool) -> String {
    let primary = setting(pool, "embed_url", "AGENTD_EMBED_URL", "").await;
    let fallback = setting(pool, "embed_fallback_url", "AGENTD_EMBED_FALLBACK_URL", "").await;
    resolve_url(&primary, &fallback, "http://localhost:8001/v1")
}

/// All current settings, keys sorted (`GET /api/settings`).
pub async fn list_all(pool: &PgPool) -> sqlx::Result<std::collections::BTreeMap<String, String>> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM app_settings ORDER BY key").fetch_all(pool).await?;
    Ok(rows.into_iter().collect())
}

/// Upsert a settings batch (`PUT /api/settings`) — only known keys from
/// [`DEFAULT_SETTINGS`] are accepted, unknown keys are silently ignored.
pub async fn update_settings(pool: &PgPool, updates: &std::collections::HashMap<String, String>) -> sqlx::Result<()> {
    let known: std::collections::HashSet<&str> = DEFAULT_SETTINGS.iter().map(|(k, _)| *k).collect();
    for (key, value) in updates {
        if !known.contains(key.as_str()) {
            continue;
        }
        sqlx::query("INSERT INTO app_settings (key, value, updated_at) VALUES ($1, $2, now()) ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = now()")
            .bind(key)
            .bind(value)
            .execute(pool)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_primary_when_absolute() {
        assert_eq!(resolve_url("http://a", "http://b", "http://c"), "http://a");
    }

    #[test]
    fn skips_relative_primary() {
        assert_eq!(resolve_url("/proxy", "http://b", "http://c"), "http://b");
    }

    #[test]
    fn falls_back_to_default() {
        assert_eq!(resolve_url("", "", "http://c"), "http://c");
        assert_eq!(resolve_url("/p", "/q", "http://c"), "http://c");
    }
}
