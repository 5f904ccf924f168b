// src/ingest/providers/mod.rs
pub mod reddit;
pub mod rss;

use crate::ingest::config::FeedsConfig;
use crate::ingest::types::SourceProvider;

use self::reddit::RedditProvider;
use self::rss::RssProvider;

/// Build HTTP-backed providers for every configured feed and subreddit.
pub fn providers_from_config(cfg: &FeedsConfig) -> Vec<Box<dyn SourceProvider>> {
    let client = reqwest::Client::builder()
        .user_agent(reddit::user_agent_from_env())
        .build()
        .unwrap_or_default();

    let mut out: Vec<Box<dyn SourceProvider>> = Vec::new();
    for (name, url) in &cfg.rss_feeds {
        out.push(Box::new(
            RssProvider::from_url(name, url, client.clone()).with_limit(cfg.limit_per_feed),
        ));
    }
    for sub in &cfg.reddit_subreddits {
        out.push(Box::new(
            RedditProvider::from_subreddit(sub, client.clone()).with_limit(cfg.limit_per_feed),
        ));
    }
    out
}
