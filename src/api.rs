use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::ingest::{self, IngestReport};
use crate::item::NewsItem;
use crate::ranking::sort_news_items;
use crate::relevance::{config_path_from_env, RelevanceHandle};
use crate::storage::{same_source, NewsStorage};

#[derive(Clone)]
pub struct AppState {
    pub relevance: RelevanceHandle,
    pub store: Arc<NewsStorage>,
    /// Where `/admin/reload-config` reads from.
    pub config_path: PathBuf,
}

impl AppState {
    pub fn new(relevance: RelevanceHandle, store: Arc<NewsStorage>) -> Self {
        Self {
            relevance,
            store,
            config_path: config_path_from_env(),
        }
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/ingest", post(ingest_items))
        .route("/retrieve", get(retrieve_items))
        .route("/reset", post(reset_storage))
        .route("/debug/score", post(debug_score))
        .route("/admin/reload-config", post(admin_reload_config))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Errors surfaced to HTTP clients as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unprocessable(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

#[derive(Deserialize)]
struct IngestParams {
    threshold: Option<f64>,
}

#[derive(Serialize)]
struct IngestResp {
    accepted: usize,
    stored: usize,
    total: usize,
}

/// Score the posted items and store the relevant ones. An empty batch is a 400; one invalid
/// item rejects the batch.
async fn ingest_items(
    State(state): State<AppState>,
    Query(params): Query<IngestParams>,
    Json(items): Json<Vec<NewsItem>>,
) -> Result<Json<IngestResp>, ApiError> {
    if items.is_empty() {
        return Err(ApiError::BadRequest("No items provided.".into()));
    }
    for (i, it) in items.iter().enumerate() {
        it.validate()
            .map_err(|e| ApiError::Unprocessable(format!("item #{i}: {e}")))?;
    }
    if let Some(t) = params.threshold.filter(|t| !t.is_finite()) {
        return Err(ApiError::Unprocessable(format!("threshold {t} is not finite")));
    }

    let engine = state.relevance.current();
    let IngestReport {
        fetched,
        accepted,
        stored,
        ..
    } = ingest::ingest_items(items, &engine, &state.store, params.threshold);

    Ok(Json(IngestResp {
        accepted,
        stored,
        total: fetched,
    }))
}

#[derive(Deserialize)]
struct RetrieveParams {
    source: Option<String>,
    since_minutes: Option<i64>,
}

/// Stored items ranked by relevance × recency, optionally narrowed by source and age.
async fn retrieve_items(
    State(state): State<AppState>,
    Query(params): Query<RetrieveParams>,
) -> Json<Vec<NewsItem>> {
    // an out-of-range window reaches back past any timestamp
    let window = params
        .since_minutes
        .map(|m| chrono::Duration::try_minutes(m.max(0)).unwrap_or(chrono::Duration::MAX));
    let items = match (params.source.as_deref(), window) {
        (None, None) => state.store.get_all(),
        (Some(src), None) => state.store.get_by_source(src),
        (src, Some(w)) => {
            let mut recent = state.store.get_since(w);
            if let Some(src) = src {
                recent.retain(|it| same_source(&it.source, src));
            }
            recent
        }
    };
    Json(sort_news_items(&items))
}

async fn reset_storage(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.store.clear();
    Json(serde_json::json!({ "status": "cleared" }))
}

#[derive(Serialize)]
struct ScoreOut {
    id: String,
    score: f64,
    base: f64,
    source_weight: f64,
    matched_keywords: Vec<String>,
    matched_patterns: Vec<String>,
    threshold: f64,
    relevant: bool,
}

async fn debug_score(
    State(state): State<AppState>,
    Json(item): Json<NewsItem>,
) -> Result<Json<ScoreOut>, ApiError> {
    item.validate()
        .map_err(|e| ApiError::Unprocessable(e.to_string()))?;
    let engine = state.relevance.current();
    let b = engine.explain(&item);
    let threshold = engine.threshold();
    Ok(Json(ScoreOut {
        id: item.id,
        relevant: b.score >= threshold,
        score: b.score,
        base: b.base,
        source_weight: b.source_weight,
        matched_keywords: b.matched_keywords,
        matched_patterns: b.matched_patterns,
        threshold,
    }))
}

/// Re-read the relevance config; the previous engine stays active if the file is bad.
async fn admin_reload_config(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .relevance
        .reload_from(&state.config_path)
        .map_err(|e| ApiError::Internal(format!("reload failed: {e}")))?;
    let threshold = state.relevance.current().threshold();
    metrics::gauge!("relevance_threshold").set(threshold);
    Ok(Json(serde_json::json!({ "status": "reloaded", "threshold": threshold })))
}
