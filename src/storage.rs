//! storage.rs — deduplicating news store with JSON file persistence.
//!
//! Every read-modify-write runs under one mutex, so a batch insert is seen by readers either
//! entirely or not at all. First write wins: an id already present is never overwritten.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

use crate::item::NewsItem;

pub const DEFAULT_STORE_PATH: &str = ".data/news_store.json";
pub const ENV_STORE_PATH: &str = "NEWS_STORE_PATH";

/// On-disk record. Keeps the score so a restart does not flatten the ranking.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    id: String,
    source: String,
    title: String,
    #[serde(default)]
    body: String,
    published_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    relevance_score: Option<f64>,
}

impl From<&NewsItem> for StoredRecord {
    fn from(it: &NewsItem) -> Self {
        Self {
            id: it.id.clone(),
            source: it.source.clone(),
            title: it.title.clone(),
            body: it.body.clone(),
            published_at: it.published_at,
            relevance_score: it.relevance_score,
        }
    }
}

impl From<StoredRecord> for NewsItem {
    fn from(r: StoredRecord) -> Self {
        Self {
            id: r.id,
            source: r.source,
            title: r.title,
            body: r.body,
            published_at: r.published_at,
            relevance_score: r.relevance_score,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    items: HashMap<String, NewsItem>,
    // insertion order, so get_all is stable between calls
    order: Vec<String>,
}

impl Inner {
    fn insert(&mut self, item: NewsItem) -> bool {
        if self.items.contains_key(&item.id) {
            return false;
        }
        self.order.push(item.id.clone());
        self.items.insert(item.id.clone(), item);
        true
    }

    fn values(&self) -> impl Iterator<Item = &NewsItem> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }
}

#[derive(Debug)]
pub struct NewsStorage {
    inner: Mutex<Inner>,
    file: Option<PathBuf>,
}

impl NewsStorage {
    /// Store without a backing file (tests, ephemeral runs).
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            file: None,
        }
    }

    /// Open a file-backed store, loading whatever the file holds.
    /// A missing or unreadable file starts an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let file = path.into();
        if let Some(dir) = file.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(dir) {
                warn!(target: "storage", error = %e, dir = %dir.display(), "cannot create store directory");
            }
        }
        let inner = load_from_file(&file);
        Self {
            inner: Mutex::new(inner),
            file: Some(file),
        }
    }

    /// `NEWS_STORE_PATH` or `.data/news_store.json`.
    pub fn open_default() -> Self {
        let path = std::env::var(ENV_STORE_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORE_PATH));
        Self::open(path)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert unless the id is already stored. Returns whether it was inserted.
    pub fn add(&self, item: NewsItem) -> bool {
        let mut g = self.lock();
        let id = item.id.clone();
        let inserted = g.insert(item);
        if inserted {
            self.save(&g);
            info!(target: "storage", %id, "stored news item");
        } else {
            debug!(target: "storage", %id, "skipped duplicate news item");
        }
        inserted
    }

    /// Insert every item whose id is new (also deduplicating within the batch).
    /// Returns the number newly inserted.
    pub fn add_many(&self, items: impl IntoIterator<Item = NewsItem>) -> usize {
        let mut g = self.lock();
        let mut total = 0usize;
        let mut added = 0usize;
        for it in items {
            total += 1;
            if g.insert(it) {
                added += 1;
            }
        }
        if added > 0 {
            self.save(&g);
        }
        info!(target: "storage", added, total, "stored new news items");
        added
    }

    pub fn get_all(&self) -> Vec<NewsItem> {
        self.lock().values().cloned().collect()
    }

    /// Items whose source equals `source`, ignoring case.
    pub fn get_by_source(&self, source: &str) -> Vec<NewsItem> {
        self.lock()
            .values()
            .filter(|it| same_source(&it.source, source))
            .cloned()
            .collect()
    }

    /// Items published within the trailing `window`.
    pub fn get_since(&self, window: Duration) -> Vec<NewsItem> {
        self.get_since_at(Utc::now(), window)
    }

    /// A window reaching past the earliest representable time returns everything.
    pub fn get_since_at(&self, now: DateTime<Utc>, window: Duration) -> Vec<NewsItem> {
        let cutoff = now.checked_sub_signed(window);
        self.lock()
            .values()
            .filter(|it| cutoff.is_none_or(|c| it.published_at >= c))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        {
            let mut g = self.lock();
            g.items.clear();
            g.order.clear();
            self.save(&g);
        }
        info!(target: "storage", "cleared all news items");
    }

    /// Write the whole set via temp file + rename. Failures are logged only.
    fn save(&self, inner: &Inner) {
        let Some(path) = &self.file else {
            return;
        };
        let records: Vec<StoredRecord> = inner.values().map(StoredRecord::from).collect();
        match write_atomic(path, &records) {
            Ok(()) => debug!(target: "storage", count = records.len(), path = %path.display(), "saved news store"),
            Err(e) => error!(target: "storage", error = %e, path = %path.display(), "saving news store failed"),
        }
    }
}

/// Source equality as the store sees it: case-insensitive.
pub fn same_source(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn write_atomic(path: &Path, records: &[StoredRecord]) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(records)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn load_from_file(path: &Path) -> Inner {
    let mut inner = Inner::default();
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => {
            info!(target: "storage", path = %path.display(), "store file does not exist; starting empty");
            return inner;
        }
    };
    match serde_json::from_str::<Vec<StoredRecord>>(&content) {
        Ok(records) => {
            for r in records {
                inner.insert(r.into());
            }
            info!(target: "storage", count = inner.items.len(), path = %path.display(), "loaded news items");
        }
        Err(e) => {
            error!(target: "storage", error = %e, path = %path.display(), "store file is corrupt; starting empty");
        }
    }
    inner
}
