// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod scheduler;
pub mod types;

use crate::filter;
use crate::ingest::types::SourceProvider;
use crate::item::NewsItem;
use crate::relevance::RelevanceEngine;
use crate::storage::NewsStorage;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

/// Max characters kept from a title or body after normalization.
pub const MAX_TEXT_CHARS: usize = 1500;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe_ingest_metrics);
}

/// Descriptions for every series the ingest path emits.
fn describe_ingest_metrics() {
    describe_counter!("ingest_items_total", "Candidate items fetched from providers.");
    describe_counter!(
        "ingest_invalid_total",
        "Candidates dropped for missing id/source/title."
    );
    describe_counter!(
        "ingest_accepted_total",
        "Candidates that cleared the relevance threshold."
    );
    describe_counter!(
        "ingest_stored_total",
        "Accepted items newly inserted into the store."
    );
    describe_counter!(
        "ingest_provider_errors_total",
        "Provider fetch/parse errors."
    );
    describe_histogram!("ingest_parse_ms", "Provider parse time in milliseconds.");
    describe_counter!("ingest_runs_total", "Scheduled ingest passes.");
    describe_gauge!(
        "ingest_pipeline_last_run_ts",
        "Unix ts when ingest pipeline last ran."
    );
}

/// Normalize feed text: decode entities, strip tags, fold quotes and whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (incl. NBSP)
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }

    out
}

/// Normalize title/body of a provider record.
pub fn normalize_item(mut item: NewsItem) -> NewsItem {
    item.title = normalize_text(&item.title);
    item.body = normalize_text(&item.body);
    item.source = item.source.trim().to_string();
    item
}

/// Counts from one pass through the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct IngestReport {
    pub fetched: usize,
    pub invalid: usize,
    pub accepted: usize,
    pub stored: usize,
}

/// Score a batch once and store the relevant part. Shared by the HTTP ingest endpoint and
/// the provider pipeline. Invalid items are dropped and counted.
pub fn ingest_items(
    items: Vec<NewsItem>,
    engine: &RelevanceEngine,
    store: &NewsStorage,
    threshold: Option<f64>,
) -> IngestReport {
    let fetched = items.len();
    let (valid, invalid): (Vec<_>, Vec<_>) = items.into_iter().partition(|it| it.validate().is_ok());
    for it in &invalid {
        tracing::debug!(target: "ingest", id = %it.id, source = %it.source, "dropping invalid item");
    }

    let accepted = filter::filter_relevant(valid, engine, threshold);
    let accepted_n = accepted.len();
    let stored = store.add_many(accepted);

    counter!("ingest_items_total").increment(fetched as u64);
    counter!("ingest_invalid_total").increment(invalid.len() as u64);
    counter!("ingest_accepted_total").increment(accepted_n as u64);
    counter!("ingest_stored_total").increment(stored as u64);

    IngestReport {
        fetched,
        invalid: invalid.len(),
        accepted: accepted_n,
        stored,
    }
}

/// Run ingest once: fetch from every provider, normalize, gate on relevance, store.
/// A failing provider is logged and skipped.
pub async fn run_once(
    providers: &[Box<dyn SourceProvider>],
    engine: &RelevanceEngine,
    store: &NewsStorage,
    threshold: Option<f64>,
) -> IngestReport {
    ensure_metrics_described();

    let mut raw = Vec::new();
    for p in providers {
        match p.fetch_latest().await {
            Ok(v) => raw.extend(v.into_iter().map(normalize_item)),
            Err(e) => {
                tracing::warn!(error = ?e, provider = p.name(), "provider error");
                counter!("ingest_provider_errors_total").increment(1);
            }
        }
    }

    let report = ingest_items(raw, engine, store, threshold);

    let now = chrono::Utc::now().timestamp().max(0);
    gauge!("ingest_pipeline_last_run_ts").set(now as f64);
    tracing::info!(
        target: "ingest",
        fetched = report.fetched,
        invalid = report.invalid,
        accepted = report.accepted,
        stored = report.stored,
        "ingest pass finished"
    );

    report
}
