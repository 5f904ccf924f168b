// src/relevance.rs
//! Relevance gate primitives: config schema, regex compilation, scoring and the
//! swappable engine handle.

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use crate::item::NewsItem;
use crate::source_weights::SourceWeights;

// --- env defaults & names ---
pub const DEFAULT_RELEVANCE_CONFIG_PATH: &str = "config/relevance.toml";
pub const DEFAULT_RELEVANCE_THRESHOLD: f64 = 2.0;

pub const ENV_RELEVANCE_CONFIG_PATH: &str = "RELEVANCE_CONFIG_PATH";
pub const ENV_RELEVANCE_THRESHOLD: &str = "RELEVANCE_THRESHOLD";
pub const ENV_RELEVANCE_HOT_RELOAD: &str = "RELEVANCE_HOT_RELOAD";

/// Errors raised while loading a relevance config. Any of them rejects the whole document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read relevance config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("relevance config is not valid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("relevance config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("pattern bonus #{index} `{pattern}` is not a valid regex: {source}")]
    Pattern {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("`{field}` must be a finite number")]
    NotFinite { field: String },
}

// parse optional float env; non-finite or garbage is ignored
fn parse_threshold_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/* ----------------------------
Config schema (TOML or JSON)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelevanceConfig {
    #[serde(default)]
    pub keyword_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub pattern_bonuses: Vec<PatternBonus>,
    #[serde(default)]
    pub source_weights: SourceWeights,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    DEFAULT_RELEVANCE_THRESHOLD
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            keyword_scores: BTreeMap::new(),
            pattern_bonuses: Vec::new(),
            source_weights: SourceWeights::default(),
            threshold: DEFAULT_RELEVANCE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternBonus {
    pub pattern: String,
    pub bonus: f64,
}

/* ----------------------------
Compiled engine structures
---------------------------- */

#[derive(Debug)]
struct CompiledKeyword {
    keyword: String,
    needle: String,
    weight: f64,
}

#[derive(Debug)]
struct CompiledPattern {
    pattern: String,
    re: Regex,
    bonus: f64,
}

/// Per-item account of how a score was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub matched_keywords: Vec<String>,
    pub matched_patterns: Vec<String>,
    pub base: f64,
    pub source_weight: f64,
    pub score: f64,
}

/// Immutable, validated scoring model. Build once, share behind an `Arc`.
#[derive(Debug)]
pub struct RelevanceEngine {
    pub cfg: RelevanceConfig,
    keywords: Vec<CompiledKeyword>,
    patterns: Vec<CompiledPattern>,
}

impl RelevanceEngine {
    /// Load using `RELEVANCE_CONFIG_PATH` (default `config/relevance.toml`), then apply the
    /// optional `RELEVANCE_THRESHOLD` override.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_path_with_env_overrides(config_path_from_env())
    }

    /// [`from_path`](Self::from_path) plus the `RELEVANCE_THRESHOLD` override. Startup and
    /// every reload go through here so the override survives a reload.
    pub fn from_path_with_env_overrides(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut eng = Self::from_path(path)?;
        if let Some(t) = parse_threshold_env(std::env::var(ENV_RELEVANCE_THRESHOLD).ok()) {
            eng.cfg.threshold = t;
        }
        Ok(eng)
    }

    /// Load from a file; `.json` is parsed as JSON, anything else as TOML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let cfg: RelevanceConfig = toml::from_str(toml_str)?;
        Self::from_config(cfg)
    }

    pub fn from_json_str(json_str: &str) -> Result<Self, ConfigError> {
        let cfg: RelevanceConfig = serde_json::from_str(json_str)?;
        Self::from_config(cfg)
    }

    /// Validate numbers and compile patterns. Invalid regexes fail the whole config.
    pub fn from_config(cfg: RelevanceConfig) -> Result<Self, ConfigError> {
        ensure_finite("threshold", cfg.threshold)?;

        let keywords = cfg
            .keyword_scores
            .iter()
            .map(|(k, &w)| {
                ensure_finite(&format!("keyword_scores.{k}"), w)?;
                Ok(CompiledKeyword {
                    keyword: k.clone(),
                    needle: k.to_lowercase(),
                    weight: w,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let patterns = cfg
            .pattern_bonuses
            .iter()
            .enumerate()
            .map(|(index, p)| {
                ensure_finite(&format!("pattern_bonuses[{index}].bonus"), p.bonus)?;
                let re = RegexBuilder::new(&p.pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigError::Pattern {
                        index,
                        pattern: p.pattern.clone(),
                        source,
                    })?;
                Ok(CompiledPattern {
                    pattern: p.pattern.clone(),
                    re,
                    bonus: p.bonus,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        for (src, w) in cfg.source_weights.iter() {
            ensure_finite(&format!("source_weights.{src}"), w)?;
        }

        Ok(Self {
            cfg,
            keywords,
            patterns,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.cfg.threshold
    }

    /// Score an item and report which rules fired.
    pub fn explain(&self, item: &NewsItem) -> ScoreBreakdown {
        let content = item.scoring_content();
        let mut base = 0.0;
        let mut matched_keywords = Vec::new();
        let mut matched_patterns = Vec::new();

        for k in &self.keywords {
            if content.contains(&k.needle) {
                debug!(target: "relevance", id = %item.id, keyword = %k.keyword, weight = k.weight, "keyword matched");
                base += k.weight;
                matched_keywords.push(k.keyword.clone());
            }
        }

        for p in &self.patterns {
            if p.re.is_match(&content) {
                debug!(target: "relevance", id = %item.id, pattern = %p.pattern, bonus = p.bonus, "pattern matched");
                base += p.bonus;
                matched_patterns.push(p.pattern.clone());
            }
        }

        let source_weight = self.cfg.source_weights.weight_for(&item.source);
        let score = base * source_weight;
        debug!(
            target: "relevance",
            id = %item.id, base, source_weight, score,
            "relevance scored"
        );

        ScoreBreakdown {
            matched_keywords,
            matched_patterns,
            base,
            source_weight,
            score,
        }
    }

    /// Final relevance score for `item`.
    pub fn score(&self, item: &NewsItem) -> f64 {
        self.explain(item).score
    }
}

/// Free-function form of [`RelevanceEngine::score`].
pub fn compute_relevance_score(item: &NewsItem, engine: &RelevanceEngine) -> f64 {
    engine.score(item)
}

fn ensure_finite(field: &str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite {
            field: field.to_string(),
        })
    }
}

pub fn config_path_from_env() -> PathBuf {
    std::env::var(ENV_RELEVANCE_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_RELEVANCE_CONFIG_PATH))
}

/* ----------------------------
Thread-safe handle + hot reload
---------------------------- */

/// Shared handle to the active engine. Readers get an `Arc` snapshot; reloads swap in a
/// whole new engine so a score never sees a half-updated config.
#[derive(Clone)]
pub struct RelevanceHandle {
    inner: Arc<RwLock<Arc<RelevanceEngine>>>,
}

impl RelevanceHandle {
    pub fn new(engine: RelevanceEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(engine))),
        }
    }

    /// Snapshot of the engine currently in force.
    pub fn current(&self) -> Arc<RelevanceEngine> {
        match self.inner.read() {
            Ok(g) => Arc::clone(&g),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Install `engine`, returning the one it replaced.
    pub fn swap(&self, engine: RelevanceEngine) -> Arc<RelevanceEngine> {
        let fresh = Arc::new(engine);
        match self.inner.write() {
            Ok(mut g) => std::mem::replace(&mut *g, fresh),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), fresh),
        }
    }

    /// Re-read `path` (env overrides applied) and swap on success. On error the active
    /// engine is left untouched.
    pub fn reload_from(&self, path: &Path) -> Result<(), ConfigError> {
        let engine = RelevanceEngine::from_path_with_env_overrides(path)?;
        info!(
            target: "relevance",
            path = %path.display(),
            keywords = engine.cfg.keyword_scores.len(),
            patterns = engine.cfg.pattern_bonuses.len(),
            threshold = engine.cfg.threshold,
            "relevance config reloaded"
        );
        self.swap(engine);
        Ok(())
    }

    pub fn score(&self, item: &NewsItem) -> f64 {
        self.current().score(item)
    }
}

/// Returns true if we should enable hot reload (dev/local only).
fn hot_reload_enabled() -> bool {
    let want = std::env::var(ENV_RELEVANCE_HOT_RELOAD)
        .ok()
        .map(|v| v == "1")
        .unwrap_or(false);
    if !want {
        return false;
    }
    // Dev gating
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("SHUTTLE_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

/// Start a polling watcher on `path` that swaps in a fresh engine when the file changes.
/// Polls mtime every 2s.
pub fn start_hot_reload_thread(handle: RelevanceHandle, path: PathBuf) {
    if !hot_reload_enabled() {
        return;
    }

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            if let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) {
                let changed = match last_mtime {
                    None => {
                        last_mtime = Some(mtime);
                        false
                    }
                    Some(prev) => mtime > prev,
                };
                if changed {
                    if let Err(e) = handle.reload_from(&path) {
                        warn!(target: "relevance", error = %e, "hot reload rejected; keeping previous config");
                    }
                    last_mtime = Some(mtime);
                }
            }
            thread::sleep(poll);
        }
    });
}

/* ----------------------------
Tests
---------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const TEST_TOML: &str = r#"
threshold = 2.0

[keyword_scores]
ransomware = 5
breach = 4
CVE = 3
"critical vulnerability" = 5
exploit = 3
"zero-day" = 5
patch = 2

[[pattern_bonuses]]
pattern = 'CVE-\d{4}-\d+'
bonus = 3

[[pattern_bonuses]]
pattern = '\bexploit\s+released\b'
bonus = 3

[source_weights]
reddit = 1.0
arstechnica = 1.2
"#;

    fn eng() -> RelevanceEngine {
        RelevanceEngine::from_toml_str(TEST_TOML).expect("load test config")
    }

    fn item(source: &str, title: &str, body: &str) -> NewsItem {
        let ts = Utc.with_ymd_and_hms(2025, 6, 15, 16, 0, 0).unwrap();
        NewsItem::new("t-1", source, title, body, ts)
    }

    #[test]
    fn keyword_counts_once_per_keyword() {
        let e = eng();
        let once = e.score(&item("mock", "breach", ""));
        let many = e.score(&item("mock", "breach breach breach", "another breach"));
        assert_eq!(once, 4.0);
        assert_eq!(many, 4.0);
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let e = eng();
        let b = e.explain(&item("mock", "New cve published", ""));
        assert_eq!(b.matched_keywords, vec!["CVE".to_string()]);
        assert_eq!(b.score, 3.0);
    }

    #[test]
    fn pattern_bonus_is_case_insensitive_and_in_order() {
        let e = eng();
        let b = e.explain(&item("mock", "Exploit Released for cve-2024-1", ""));
        assert_eq!(
            b.matched_patterns,
            vec![r"CVE-\d{4}-\d+".to_string(), r"\bexploit\s+released\b".to_string()]
        );
        // cve 3 + exploit 3 + two patterns 3 + 3
        assert_eq!(b.base, 12.0);
    }

    #[test]
    fn source_weight_multiplies_base() {
        let e = eng();
        let b = e.explain(&item("ArsTechnica", "breach", ""));
        assert!((b.source_weight - 1.2).abs() < 1e-9);
        assert!((b.score - 4.8).abs() < 1e-9);
    }

    #[test]
    fn body_absent_scores_as_empty() {
        let e = eng();
        assert_eq!(e.score(&item("mock", "nothing to see", "")), 0.0);
    }

    #[test]
    fn missing_tables_default_to_empty() {
        let e = RelevanceEngine::from_toml_str("").expect("empty doc is a valid config");
        assert!(e.cfg.keyword_scores.is_empty());
        assert!(e.cfg.pattern_bonuses.is_empty());
        assert!(e.cfg.source_weights.is_empty());
        assert_eq!(e.threshold(), DEFAULT_RELEVANCE_THRESHOLD);
        assert_eq!(e.score(&item("anything", "ransomware breach", "")), 0.0);
    }

    #[test]
    fn invalid_regex_rejects_config() {
        let err = RelevanceEngine::from_toml_str(
            r#"
[[pattern_bonuses]]
pattern = 'CVE-(\d{4}'
bonus = 3
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { index: 0, .. }), "{err}");
    }

    #[test]
    fn wrong_shape_is_a_config_error() {
        let err = RelevanceEngine::from_toml_str("keyword_scores = [1, 2]").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
        let err = RelevanceEngine::from_toml_str("keyword_score = { a = 1 }").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)), "unknown top-level key must fail");
        let err = RelevanceEngine::from_json_str(r#"{"threshold": "high"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
        let err = RelevanceEngine::from_toml_str("[source_weights]\nReddit = 2.0\nreddit = 1.0")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)), "case-colliding source keys must fail");
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let err = RelevanceEngine::from_toml_str("threshold = nan").unwrap_err();
        assert!(matches!(err, ConfigError::NotFinite { .. }));
        let err = RelevanceEngine::from_toml_str("[keyword_scores]\nleak = inf").unwrap_err();
        assert!(matches!(err, ConfigError::NotFinite { .. }));
    }

    #[test]
    fn json_config_matches_toml() {
        let e = RelevanceEngine::from_json_str(
            r#"{
                "keyword_scores": {"breach": 4},
                "pattern_bonuses": [{"pattern": "\\bGoogle\\b.*\\bbreach\\b", "bonus": 2}],
                "source_weights": {"tomshardware": 1.1}
            }"#,
        )
        .unwrap();
        let s = e.score(&item("tomshardware", "Google confirms breach", ""));
        assert!((s - 6.6).abs() < 1e-9);
    }

    #[test]
    fn threshold_env_parsing() {
        assert_eq!(parse_threshold_env(Some(" 3.5 ".into())), Some(3.5));
        assert_eq!(parse_threshold_env(Some("NaN".into())), None);
        assert_eq!(parse_threshold_env(Some("abc".into())), None);
        assert_eq!(parse_threshold_env(None), None);
    }

    #[test]
    fn handle_swap_replaces_whole_engine() {
        let h = RelevanceHandle::new(eng());
        let before = h.current();
        let probe = item("mock", "AWS outage", "");
        assert_eq!(h.score(&probe), 0.0);

        h.swap(RelevanceEngine::from_toml_str("[keyword_scores]\noutage = 3").unwrap());
        assert_eq!(h.score(&probe), 3.0);
        // an old snapshot keeps scoring with the old config
        assert_eq!(before.score(&probe), 0.0);
    }

    #[test]
    fn failed_reload_keeps_previous_engine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relevance.toml");
        fs::write(&path, "[[pattern_bonuses]]\npattern = '('\nbonus = 1").unwrap();

        let h = RelevanceHandle::new(eng());
        assert!(h.reload_from(&path).is_err());
        assert_eq!(h.current().threshold(), 2.0);
        assert_eq!(h.score(&item("mock", "breach", "")), 4.0);

        fs::write(&path, "threshold = 7.0").unwrap();
        h.reload_from(&path).unwrap();
        assert_eq!(h.current().threshold(), 7.0);
    }
}
