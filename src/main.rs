//! IT newsfeed service — binary entrypoint.
//! Boots the Axum HTTP server, wiring the relevance engine, the news store, the optional
//! ingest scheduler and the metrics endpoint.

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use it_newsfeed::ingest::config::load_feeds_default;
use it_newsfeed::ingest::providers::providers_from_config;
use it_newsfeed::ingest::scheduler::{spawn_scheduler, IngestSchedulerCfg};
use it_newsfeed::metrics::Metrics;
use it_newsfeed::relevance::{config_path_from_env, start_hot_reload_thread};
use it_newsfeed::{api, AppState, NewsStorage, RelevanceEngine, RelevanceHandle};

/// Install a compact (or JSON with LOG_FORMAT=json) subscriber. A subscriber installed by
/// the runtime takes precedence.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("it_newsfeed=info,relevance=info,ingest=info,storage=info,warn"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let _ = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    // --- Relevance engine: a bad config stops startup ---
    let engine = RelevanceEngine::from_env().context("loading relevance config")?;
    let threshold = engine.threshold();
    tracing::info!(
        target: "relevance",
        keywords = engine.cfg.keyword_scores.len(),
        patterns = engine.cfg.pattern_bonuses.len(),
        sources = engine.cfg.source_weights.len(),
        threshold,
        "relevance config loaded"
    );
    let handle = RelevanceHandle::new(engine);
    start_hot_reload_thread(handle.clone(), config_path_from_env());

    let store = Arc::new(NewsStorage::open_default());

    // --- Optional background polling of feeds/subreddits ---
    if let Some(cfg) = IngestSchedulerCfg::from_env() {
        let feeds = load_feeds_default().context("loading feeds config")?;
        if feeds.is_empty() {
            tracing::warn!(target: "ingest", "scheduler enabled but no feeds configured");
        } else {
            let providers = providers_from_config(&feeds);
            tracing::info!(target: "ingest", providers = providers.len(), interval_secs = cfg.interval_secs, "starting ingest scheduler");
            spawn_scheduler(cfg, providers, handle.clone(), store.clone());
        }
    }

    let metrics = Metrics::init(threshold)?;

    let state = AppState::new(handle, store);
    let router = api::router(state).merge(metrics.router());

    Ok(router.into())
}
