// src/ingest/providers/reddit.rs
//! Subreddit "hot" listing via Reddit's public JSON endpoint.
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use serde::Deserialize;

use crate::ingest::normalize_text;
use crate::ingest::types::SourceProvider;
use crate::item::NewsItem;

pub const ENV_REDDIT_USER_AGENT: &str = "REDDIT_USER_AGENT";
const DEFAULT_USER_AGENT: &str = "it-newsfeed/0.1";

pub fn user_agent_from_env() -> String {
    std::env::var(ENV_REDDIT_USER_AGENT)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    title: String,
    #[serde(default)]
    selftext: String,
    created_utc: f64,
}

enum Mode {
    Fixture(String),
    Http { client: reqwest::Client },
}

pub struct RedditProvider {
    subreddit: String,
    source: String,
    limit: usize,
    mode: Mode,
}

impl RedditProvider {
    pub fn from_fixture(subreddit: &str, json: &str) -> Self {
        Self::with_mode(subreddit, Mode::Fixture(json.to_string()))
    }

    pub fn from_subreddit(subreddit: &str, client: reqwest::Client) -> Self {
        Self::with_mode(subreddit, Mode::Http { client })
    }

    fn with_mode(subreddit: &str, mode: Mode) -> Self {
        Self {
            subreddit: subreddit.to_string(),
            source: format!("reddit/{subreddit}"),
            limit: crate::ingest::config::DEFAULT_LIMIT_PER_FEED,
            mode,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn listing_url(&self) -> String {
        format!(
            "https://www.reddit.com/r/{}/hot.json?limit={}",
            self.subreddit, self.limit
        )
    }

    fn parse_listing(&self, s: &str) -> Result<Vec<NewsItem>> {
        let t0 = std::time::Instant::now();
        let listing: Listing = serde_json::from_str(s)
            .with_context(|| format!("parsing {} listing json", self.source))?;

        let out = listing
            .data
            .children
            .into_iter()
            .take(self.limit)
            .filter_map(|c| {
                let p = c.data;
                let title = normalize_text(&p.title);
                if title.is_empty() {
                    return None;
                }
                let published_at = DateTime::from_timestamp(p.created_utc as i64, 0)
                    .unwrap_or_else(Utc::now);
                Some(NewsItem::new(
                    format!("reddit-{}", p.id),
                    self.source.clone(),
                    title,
                    normalize_text(&p.selftext),
                    published_at,
                ))
            })
            .collect::<Vec<_>>();

        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for RedditProvider {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_listing(s),
            Mode::Http { client } => {
                let url = self.listing_url();
                // errors are logged and counted once, by the ingest pass
                let body = client
                    .get(&url)
                    .send()
                    .await
                    .context("reddit http get()")?
                    .error_for_status()
                    .context("reddit http status")?
                    .text()
                    .await
                    .context("reddit http .text()")?;
                self.parse_listing(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.source
    }
}
