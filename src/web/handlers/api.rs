use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::pipeline::models::QueryResponse;
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    /// Drop every cached answer before this question runs
    #[serde(default)]
    pub clear_cache: bool,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub cache_enabled: bool,
    pub cache_entries: usize,
    pub sql_model: String,
    pub nlp_model: String,
    pub prompt_strategy: String,
}

// Per-run failures are still a 200: the error is carried in the answer text
pub async fn ask(
    state: State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, String)> {
    if payload.question.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Question must not be empty".to_string()));
    }

    let mut pipeline = state.pipeline.lock().await;
    if payload.clear_cache {
        pipeline.clear_cache();
    }

    let response = pipeline.ask(&payload.question).await;
    Ok(Json(response))
}

pub async fn clear_cache(state: State<Arc<AppState>>) -> StatusCode {
    state.pipeline.lock().await.clear_cache();
    info!("Cache cleared via API");
    StatusCode::NO_CONTENT
}

pub async fn system_status(state: State<Arc<AppState>>) -> Json<SystemStatus> {
    let now = chrono::Utc::now();
    let uptime = now.signed_duration_since(state.startup_time).num_seconds();

    let pipeline = state.pipeline.lock().await;
    let settings = pipeline.settings();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        cache_enabled: pipeline.cache().is_enabled(),
        cache_entries: pipeline.cache().len(),
        sql_model: settings.sql_model.model.clone(),
        nlp_model: settings.nlp_model.model.clone(),
        prompt_strategy: settings.prompt_strategy.to_string(),
    })
}
