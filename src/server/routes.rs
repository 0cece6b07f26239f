//! Route table for the HTTP surface (C10).

use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{agents, datasets, documents, history, settings, workflows};
use super::state::AppState;

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/agents", post(agents::create).get(agents::list))
        .route("/api/agents/tools", get(agents::tools))
        .route(
            "/api/agents/{id}",
            get(agents::get).put(agents::update).delete(agents::delete),
        )
        .route("/api/agents/{id}/run", post(agents::run))
        .route("/api/workflows", post(workflows::create).get(workflows::list))
        .route(
            "/api/workflows/{id}",
            get(workflows::get).put(workflows::update).delete(workflows::delete),
        )
        .route("/api/workflows/{id}/run", post(workflows::run))
        .route("/api/kb/documents", post(documents::add).get(documents::list))
        .route("/api/kb/documents/{id}", delete(documents::delete_one))
        .route("/api/kb/documents/bulk-delete", post(documents::bulk_delete))
        .route("/api/kb/search", post(documents::search))
        .route("/api/kb/stats", get(documents::stats))
        .route("/api/kb/clear", delete(documents::clear))
        .route("/api/datasets", post(datasets::create).get(datasets::list))
        .route(
            "/api/datasets/{id}",
            get(datasets::get).put(datasets::update).delete(datasets::delete),
        )
        .route(
            "/api/datasets/{id}/records",
            post(datasets::add_records).get(datasets::list_records),
        )
        .route("/api/datasets/{id}/records/{record_id}", delete(datasets::delete_record))
        .route("/api/settings", get(settings::get).put(settings::update))
        .route("/api/history", get(history::list))
        .route("/api/history/{id}", get(history::get))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "version": crate::VERSION }))
}
