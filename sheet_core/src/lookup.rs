//! Lookup tables with nearest-lower numeric fallback
//!
//! A table maps string keys to numbers. Keys may be names (`"light"`) or
//! numeric thresholds (`"1"`, `"5"`, `"9"`); a numeric query that misses
//! every exact key falls back to the greatest threshold at or below it, so a
//! proficiency-by-level table keyed 1/5/9 answers levels 5-8 with the level-5
//! value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named lookup tables, as declared in `rules.lookups`
pub type LookupTables = BTreeMap<String, LookupTable>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LookupTable(BTreeMap<String, f64>);

impl LookupTable {
    pub fn new() -> Self {
        LookupTable(BTreeMap::new())
    }

    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve a key: exact match first, then the nearest lower numeric key
    pub fn resolve(&self, key: &str) -> Option<f64> {
        if let Some(value) = self.0.get(key) {
            return Some(*value);
        }

        let wanted = parse_numeric_key(key)?;
        self.0
            .iter()
            .filter_map(|(k, v)| parse_numeric_key(k).map(|threshold| (threshold, *v)))
            .filter(|(threshold, _)| *threshold <= wanted)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, value)| value)
    }
}

impl FromIterator<(String, f64)> for LookupTable {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        LookupTable(iter.into_iter().collect())
    }
}

fn parse_numeric_key(key: &str) -> Option<f64> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Look a key up in a named table; unknown tables and misses yield 0
pub fn lookup(tables: &LookupTables, table: &str, key: &str) -> f64 {
    tables
        .get(table)
        .and_then(|t| t.resolve(key))
        .unwrap_or(0.0)
}
