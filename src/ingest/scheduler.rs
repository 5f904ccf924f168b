// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;

use crate::ingest::types::SourceProvider;
use crate::relevance::RelevanceHandle;
use crate::storage::NewsStorage;

pub const ENV_INGEST_INTERVAL_SECS: &str = "INGEST_INTERVAL_SECS";

#[derive(Clone, Copy, Debug)]
pub struct IngestSchedulerCfg {
    pub interval_secs: u64,
    /// `None` = use the config threshold in force at each tick.
    pub threshold: Option<f64>,
}

impl IngestSchedulerCfg {
    /// `INGEST_INTERVAL_SECS`; unset, unparsable or 0 disables the scheduler.
    pub fn from_env() -> Option<Self> {
        let secs = std::env::var(ENV_INGEST_INTERVAL_SECS)
            .ok()?
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|s| *s > 0)?;
        Some(Self {
            interval_secs: secs,
            threshold: None,
        })
    }
}

/// Spawn a periodic ingest loop. The engine snapshot is taken per tick so config reloads
/// apply from the next pass on.
pub fn spawn_scheduler(
    cfg: IngestSchedulerCfg,
    providers: Vec<Box<dyn SourceProvider>>,
    relevance: RelevanceHandle,
    store: Arc<NewsStorage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(cfg.interval_secs.max(1)));
        loop {
            ticker.tick().await;
            let engine = relevance.current();
            let report =
                crate::ingest::run_once(&providers, &engine, &store, cfg.threshold).await;

            counter!("ingest_runs_total").increment(1);
            tracing::info!(
                target: "ingest",
                providers = providers.len(),
                stored = report.stored,
                "scheduled ingest tick"
            );
        }
    })
}
