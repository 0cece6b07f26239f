//! `/api/settings` routes — the C8 read-through settings store.

use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::AgentResult;
use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub settings: std::collections::BTreeMap<String, String>,
}

pub async fn get(State(state): State<AppState>) -> AgentResult<Json<SettingsResponse>> {
    let settings = config::list_all(&state.pool).await?;
    Ok(Json(SettingsResponse { settings }))
}

#[derive(Debug, Deserialize)]
pub struct SettingsUpdateRequest {
    pub settings: HashMap<String, String>,
}

pub async fn update(State(state): State<AppState>, Json(req): Json<SettingsUpdateRequest>) -> AgentResult<Json<SettingsResponse>> {
    config::update_settings(&state.pool, &req.settings).await?;
    let settings = config::list_all(&state.pool).await?;
    Ok(Json(SettingsResponse { settings }))
}
