// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod filter;
pub mod ingest;
pub mod item;
pub mod metrics;
pub mod ranking;
pub mod relevance;
pub mod source_weights;
pub mod storage;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::filter::is_relevant;
pub use crate::item::NewsItem;
pub use crate::ranking::sort_news_items;
pub use crate::relevance::{compute_relevance_score, ConfigError, RelevanceEngine, RelevanceHandle};
pub use crate::storage::NewsStorage;
