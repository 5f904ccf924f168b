// src/ingest/types.rs
use anyhow::Result;

use crate::item::NewsItem;

/// Anything that can hand the pipeline a batch of candidate items.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>>;
    fn name(&self) -> &str;
}
