// src/item.rs
//! The news item record shared by providers, the relevance gate, the store and the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single news item as produced by a provider or posted to `/ingest`.
///
/// `relevance_score` is internal: it is never read from nor written to the public JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewsItem {
    pub id: String,
    pub source: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub body: String,
    pub published_at: DateTime<Utc>,
    #[serde(skip)]
    pub relevance_score: Option<f64>,
}

/// Why an item was rejected at the construction boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemError {
    #[error("item field `{0}` must not be empty")]
    EmptyField(&'static str),
}

impl NewsItem {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            title: title.into(),
            body: body.into(),
            published_at,
            relevance_score: None,
        }
    }

    /// Reject items missing a required value. Whitespace-only counts as missing.
    pub fn validate(&self) -> Result<(), ItemError> {
        for (name, value) in [("id", &self.id), ("source", &self.source), ("title", &self.title)] {
            if value.trim().is_empty() {
                return Err(ItemError::EmptyField(name));
            }
        }
        Ok(())
    }

    /// Return a copy annotated with `score`.
    pub fn with_score(self, score: f64) -> Self {
        Self {
            relevance_score: Some(score),
            ..self
        }
    }

    /// Text the scorer looks at: `title + " " + body`, lowercased.
    pub fn scoring_content(&self) -> String {
        format!("{} {}", self.title, self.body).to_lowercase()
    }
}

fn null_as_empty<'de, D>(de: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(de)?.unwrap_or_default())
}
