//! Evaluation scope: the read-only character view plus caller vars

use crate::character::Character;
use crate::pack::parse_rule_number;
use crate::types::ResourceValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key of the synthetic var every scope exposes, defaulting to 0
pub const BASE_HP_VAR: &str = "base_hp";

/// Vars table holding aggregated equipment caps
pub const CAPS_VAR: &str = "caps";

/// Vars table holding aggregated equipment bonuses
pub const BONUSES_VAR: &str = "bonuses";

/// A value supplied through `vars`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    Number(f64),
    Flag(bool),
    Text(String),
    Table(BTreeMap<String, VarValue>),
}

impl From<f64> for VarValue {
    fn from(value: f64) -> Self {
        VarValue::Number(value)
    }
}

impl From<bool> for VarValue {
    fn from(value: bool) -> Self {
        VarValue::Flag(value)
    }
}

impl From<&str> for VarValue {
    fn from(value: &str) -> Self {
        VarValue::Text(value.to_string())
    }
}

impl From<String> for VarValue {
    fn from(value: String) -> Self {
        VarValue::Text(value)
    }
}

impl From<BTreeMap<String, f64>> for VarValue {
    fn from(value: BTreeMap<String, f64>) -> Self {
        VarValue::Table(value.into_iter().map(|(k, v)| (k, VarValue::Number(v))).collect())
    }
}

/// Transient values visible to formulas as `vars.*`
///
/// Recompute fills `caps` and `bonuses` from equipment; callers may add
/// anything else (or override those two wholesale).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vars(BTreeMap<String, VarValue>);

impl Vars {
    pub fn new() -> Self {
        Vars(BTreeMap::new())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<VarValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<VarValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&VarValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VarValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy every top-level entry of `other` over this one
    pub fn overlay(&mut self, other: &Vars) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Read a var as formulas see it: `base_hp` falls back to 0
    pub fn scoped(&self, key: &str) -> Option<VarRef<'_>> {
        match self.0.get(key) {
            Some(value) => Some(VarRef::Value(value)),
            None if key == BASE_HP_VAR => Some(VarRef::BaseHpDefault),
            None => None,
        }
    }

    fn table_entry(&self, table: &str, key: &str) -> Option<&VarValue> {
        match self.0.get(table) {
            Some(VarValue::Table(entries)) => entries.get(key),
            _ => None,
        }
    }

    /// Upper bound for a cap key; absent or unreadable caps are unbounded
    pub fn cap_value(&self, key: &str) -> f64 {
        match self.table_entry(CAPS_VAR, key) {
            Some(VarValue::Number(n)) if !n.is_nan() => *n,
            Some(VarValue::Text(text)) => parse_rule_number(text).unwrap_or(f64::INFINITY),
            _ => f64::INFINITY,
        }
    }

    /// Bonus for a key; absent or non-numeric bonuses are 0
    pub fn bonus(&self, key: &str) -> f64 {
        match self.table_entry(BONUSES_VAR, key) {
            Some(VarValue::Number(n)) if n.is_finite() => *n,
            Some(VarValue::Text(text)) => parse_rule_number(text)
                .filter(|n| n.is_finite())
                .unwrap_or(0.0),
            _ => 0.0,
        }
    }
}

/// Result of reading a var through the formula scope
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarRef<'a> {
    Value(&'a VarValue),
    BaseHpDefault,
}

/// Read-only view formulas evaluate against
///
/// These six keys are also what the rendering layer reads.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EvalContext<'a> {
    pub level: u32,
    pub attr: &'a BTreeMap<String, f64>,
    pub res: &'a BTreeMap<String, ResourceValue>,
    pub prof: &'a BTreeMap<String, String>,
    pub derived: &'a BTreeMap<String, f64>,
    pub vars: &'a Vars,
}

impl<'a> EvalContext<'a> {
    pub fn for_character(character: &'a Character, vars: &'a Vars) -> Self {
        EvalContext {
            level: character.level,
            attr: &character.attr,
            res: &character.res,
            prof: &character.prof,
            derived: &character.derived,
            vars,
        }
    }
}
