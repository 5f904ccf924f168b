// src/ingest/providers/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::ingest::normalize_text;
use crate::ingest::types::SourceProvider;
use crate::item::NewsItem;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text")]
    value: Option<String>,
}

/// RFC 2822 (`pubDate`), with RFC 3339 as a fallback for sloppy feeds.
pub(crate) fn parse_feed_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    let odt = OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok()?;
    DateTime::from_timestamp(odt.unix_timestamp(), odt.nanosecond())
}

/// Short stable hex digest, used when an entry carries neither guid nor link.
pub(crate) fn short_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

/// RSS 2.0 feed provider. Every entry is tagged with the configured source name.
pub struct RssProvider {
    source: String,
    limit: usize,
    mode: Mode,
}

impl RssProvider {
    pub fn from_fixture(source: &str, xml: &str) -> Self {
        Self {
            source: source.to_string(),
            limit: usize::MAX,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_url(source: &str, url: &str, client: reqwest::Client) -> Self {
        Self {
            source: source.to_string(),
            limit: usize::MAX,
            mode: Mode::Http {
                url: url.to_string(),
                client,
            },
        }
    }

    /// Keep at most `limit` entries per fetch.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<NewsItem>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing {} rss xml", self.source))?;

        let mut out = Vec::with_capacity(rss.channel.item.len().min(self.limit));
        for it in rss.channel.item.into_iter().take(self.limit) {
            let title = normalize_text(it.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }
            let key = it
                .guid
                .and_then(|g| g.value)
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .or_else(|| it.link.clone().filter(|l| !l.trim().is_empty()))
                .unwrap_or_else(|| short_hash(&title));
            let published_at = it
                .pub_date
                .as_deref()
                .and_then(parse_feed_date)
                .unwrap_or_else(Utc::now);

            out.push(NewsItem::new(
                format!("{}-{}", self.source, key),
                self.source.clone(),
                title,
                normalize_text(it.description.as_deref().unwrap_or_default()),
                published_at,
            ));
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for RssProvider {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s),
            Mode::Http { url, client } => {
                // errors are logged and counted once, by the ingest pass
                let body = client
                    .get(url)
                    .send()
                    .await
                    .context("rss http get()")?
                    .error_for_status()
                    .context("rss http status")?
                    .text()
                    .await
                    .context("rss http .text()")?;
                self.parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.source
    }
}

// XML only knows five named entities; feeds routinely ship HTML ones.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
