//! # Source Weights
//!
//! Multiplicative reliability factor per news source (e.g. "arstechnica" → 1.2).
//!
//! - Deserialized straight from the `[source_weights]` table of the relevance config.
//! - Lookup is case-insensitive; keys are lowercased once when the table is built, and two
//!   keys that only differ in case are rejected at load.
//! - Unknown sources score with [`DEFAULT_SOURCE_WEIGHT`].

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};

/// Weight applied to any source missing from the table.
pub const DEFAULT_SOURCE_WEIGHT: f64 = 1.0;

/// Source name → multiplier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceWeights {
    weights: HashMap<String, f64>,
}

impl SourceWeights {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let weights = entries
            .into_iter()
            .map(|(k, w)| (normalize(k.as_ref()), w))
            .collect();
        Self { weights }
    }

    /// Weight for `source`, falling back to [`DEFAULT_SOURCE_WEIGHT`].
    pub fn weight_for(&self, source: &str) -> f64 {
        self.weights
            .get(&normalize(source))
            .copied()
            .unwrap_or(DEFAULT_SOURCE_WEIGHT)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, &w)| (k.as_str(), w))
    }
}

impl<'de> Deserialize<'de> for SourceWeights {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, f64>::deserialize(de)?;
        let mut weights = HashMap::with_capacity(raw.len());
        for (key, w) in raw {
            let norm = normalize(&key);
            if weights.insert(norm, w).is_some() {
                return Err(D::Error::custom(format!(
                    "source weight `{key}` collides with another key once lowercased"
                )));
            }
        }
        Ok(Self { weights })
    }
}

/// Lowercase only. Sources such as "reddit/netsec" keep their punctuation.
fn normalize(s: &str) -> String {
    s.to_lowercase()
}
