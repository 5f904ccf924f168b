// src/filter.rs
//! Threshold gate on top of the scorer.

use crate::item::NewsItem;
use crate::relevance::RelevanceEngine;

/// `score >= threshold`; `threshold` falls back to the config value.
pub fn is_relevant(item: &NewsItem, engine: &RelevanceEngine, threshold: Option<f64>) -> bool {
    let threshold = threshold.unwrap_or_else(|| engine.threshold());
    engine.score(item) >= threshold
}

/// Score once; return the item annotated with its score when it clears the threshold.
pub fn admit(item: NewsItem, engine: &RelevanceEngine, threshold: Option<f64>) -> Option<NewsItem> {
    let threshold = threshold.unwrap_or_else(|| engine.threshold());
    let score = engine.score(&item);
    let keep = score >= threshold;
    tracing::debug!(
        target: "relevance",
        id = %item.id, score, threshold, keep,
        "relevance gate"
    );
    keep.then(|| item.with_score(score))
}

/// Batch form of [`admit`], preserving input order.
pub fn filter_relevant(
    items: impl IntoIterator<Item = NewsItem>,
    engine: &RelevanceEngine,
    threshold: Option<f64>,
) -> Vec<NewsItem> {
    items
        .into_iter()
        .filter_map(|it| admit(it, engine, threshold))
        .collect()
}
