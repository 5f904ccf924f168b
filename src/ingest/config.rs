// src/ingest/config.rs
//! Feed sources: which RSS feeds and subreddits to poll.
//!
//! ```toml
//! limit_per_feed = 5
//! reddit_subreddits = ["netsec", "sysadmin"]
//!
//! [rss_feeds]
//! arstechnica = "https://feeds.arstechnica.com/arstechnica/security"
//! ```
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "FEEDS_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/feeds.toml";

pub const DEFAULT_LIMIT_PER_FEED: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedsConfig {
    /// Source name → feed URL.
    #[serde(default)]
    pub rss_feeds: BTreeMap<String, String>,
    #[serde(default)]
    pub reddit_subreddits: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit_per_feed: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT_PER_FEED
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            rss_feeds: BTreeMap::new(),
            reddit_subreddits: Vec::new(),
            limit_per_feed: DEFAULT_LIMIT_PER_FEED,
        }
    }
}

impl FeedsConfig {
    pub fn is_empty(&self) -> bool {
        self.rss_feeds.is_empty() && self.reddit_subreddits.is_empty()
    }
}

/// Load feeds from an explicit path. Supports TOML or JSON formats.
pub fn load_feeds_from(path: &Path) -> Result<FeedsConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading feeds config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = if ext == "json" {
        serde_json::from_str::<FeedsConfig>(&content).context("parsing feeds json")?
    } else {
        toml::from_str::<FeedsConfig>(&content).context("parsing feeds toml")?
    };
    Ok(clean(cfg))
}

/// Load feeds using env var + fallback:
/// 1) $FEEDS_CONFIG_PATH (must exist)
/// 2) config/feeds.toml
/// 3) nothing configured → empty, with a warning
pub fn load_feeds_default() -> Result<FeedsConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_feeds_from(&pb);
        }
        return Err(anyhow!("FEEDS_CONFIG_PATH points to non-existent path"));
    }
    let default = PathBuf::from(DEFAULT_PATH);
    if default.exists() {
        return load_feeds_from(&default);
    }
    tracing::warn!(target: "ingest", path = DEFAULT_PATH, "feeds config not found; no sources configured");
    Ok(FeedsConfig::default())
}

// Trim names, drop blanks, dedup subreddits (keep first occurrence order).
fn clean(cfg: FeedsConfig) -> FeedsConfig {
    let rss_feeds = cfg
        .rss_feeds
        .into_iter()
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .collect();

    let mut reddit_subreddits: Vec<String> = Vec::new();
    for s in cfg.reddit_subreddits {
        let t = s.trim().trim_start_matches("r/").to_string();
        if !t.is_empty() && !reddit_subreddits.iter().any(|x| x.eq_ignore_ascii_case(&t)) {
            reddit_subreddits.push(t);
        }
    }

    FeedsConfig {
        rss_feeds,
        reddit_subreddits,
        limit_per_feed: cfg.limit_per_feed,
    }
}
