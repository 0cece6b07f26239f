//! agentd HTTP server binary.
//!
//! # Environment Variables
//!
//! - `PORT` — HTTP port (default: 8080)
//! - `DATABASE_URL` — PostgreSQL connection string
//! - `RUST_LOG` — Tracing filter (default: "info,agentd=debug")
//! - `AGENTD_CHAT_URL` / `AGENTD_CHAT_FALLBACK_URL` — chat-completions backend
//! - `AGENTD_EMBED_URL` / `AGENTD_EMBED_FALLBACK_URL` — embeddings backend

use agentd::config::ServerConfig;
use agentd::llms::LlmClient;
use agentd::server::{app_router, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,agentd=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env();
    let bind_addr = format!("0.0.0.0:{}", config.port);

    tracing::info!("connecting to postgres...");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .min_connections(0)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to postgres");

    agentd::db::migrate(&pool).await.expect("schema migration failed");

    let chat_url = agentd::config::chat_url(&pool).await;
    let embed_url = agentd::config::embed_url(&pool).await;
    let llm = LlmClient::new(chat_url, embed_url);

    let embed_model = llm.discover_embed_model().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to discover embedding model, falling back to default");
        "text-embedding".to_string()
    });

    let state = AppState { pool, llm, embed_model };
    let app = app_router(state);

    tracing::info!("agentd starting on {bind_addr}");
    tracing::info!("  GET  /health                      — liveness probe");
    tracing::info!("  POST /api/agents/{{id}}/run          — agent run (SSE)");
    tracing::info!("  POST /api/workflows/{{id}}/run       — workflow run (SSE)");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind");

    axum::serve(listener, app).await.expect("server failed");
}
