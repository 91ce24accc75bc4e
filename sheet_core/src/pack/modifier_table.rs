//! ModifierTable - key -> number map that tolerates "Infinity" style strings

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Parse a number written as text in a rule table
///
/// Accepts plain numerals plus `Infinity`, `+Infinity` and `-Infinity`.
/// `NaN` and anything unparsable are rejected.
pub fn parse_rule_number(text: &str) -> Option<f64> {
    match text.trim() {
        "Infinity" | "+Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        other => other.parse::<f64>().ok().filter(|n| n.is_finite()),
    }
}

/// Cap or bonus contributions keyed by modifier key (e.g. `ac.dex`)
///
/// String values such as `"Infinity"` are coerced while deserializing, so a
/// loaded table only ever holds real numbers. Infinities serialize back to
/// their string spelling because JSON has no literal for them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModifierTable(BTreeMap<String, f64>);

impl ModifierTable {
    pub fn new() -> Self {
        ModifierTable(BTreeMap::new())
    }

    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for ModifierTable {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        ModifierTable(iter.into_iter().collect())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Number(f64),
    Text(String),
}

#[derive(Serialize)]
#[serde(untagged)]
enum OutNumber<'a> {
    Number(f64),
    Text(&'a str),
}

impl<'de> Deserialize<'de> for ModifierTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, RawNumber>::deserialize(deserializer)?;
        let mut table = BTreeMap::new();
        for (key, value) in raw {
            let number = match value {
                RawNumber::Number(n) => n,
                RawNumber::Text(text) => parse_rule_number(&text).ok_or_else(|| {
                    D::Error::custom(format!("invalid number '{}' for key '{}'", text, key))
                })?,
            };
            table.insert(key, number);
        }
        Ok(ModifierTable(table))
    }
}

impl Serialize for ModifierTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(key, value)| {
            let out = if *value == f64::INFINITY {
                OutNumber::Text("Infinity")
            } else if *value == f64::NEG_INFINITY {
                OutNumber::Text("-Infinity")
            } else {
                OutNumber::Number(*value)
            };
            (key, out)
        }))
    }
}
