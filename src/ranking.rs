// src/ranking.rs
//! Relevance × recency ordering for retrieval.

use std::cmp::Ordering;

use crate::item::NewsItem;

/// Score used for ordering: missing counts as 0, and `-0.0` is folded into `0.0`
/// (`total_cmp` would otherwise rank it below zero).
fn rank_score(item: &NewsItem) -> f64 {
    match item.relevance_score {
        Some(s) if s != 0.0 => s,
        _ => 0.0,
    }
}

/// Total order: score desc (missing = 0), `published_at` desc, `id` asc.
pub fn compare_items(a: &NewsItem, b: &NewsItem) -> Ordering {
    rank_score(b)
        .total_cmp(&rank_score(a))
        .then_with(|| b.published_at.cmp(&a.published_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Ranked copy of `items`; the input is left as is.
pub fn sort_news_items(items: &[NewsItem]) -> Vec<NewsItem> {
    let mut out = items.to_vec();
    out.sort_by(compare_items);
    out
}
