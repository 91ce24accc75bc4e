//! ModifierAccumulator - Collects cap/bonus contributions under stacking rules

use crate::pack::{ModifierGroup, ModifierTable, StackingRules};
use std::collections::BTreeMap;

/// Accumulates modifier contributions from equipment sources
///
/// The first contribution to a key is stored as-is; later ones combine with
/// the running value using the key's resolved stacking policy.
#[derive(Debug, Clone)]
pub struct ModifierAccumulator<'a> {
    stacking: &'a StackingRules,
    pub caps: BTreeMap<String, f64>,
    pub bonuses: BTreeMap<String, f64>,
}

impl<'a> ModifierAccumulator<'a> {
    pub fn new(stacking: &'a StackingRules) -> Self {
        ModifierAccumulator {
            stacking,
            caps: BTreeMap::new(),
            bonuses: BTreeMap::new(),
        }
    }

    fn group_mut(&mut self, group: ModifierGroup) -> &mut BTreeMap<String, f64> {
        match group {
            ModifierGroup::Caps => &mut self.caps,
            ModifierGroup::Bonuses => &mut self.bonuses,
        }
    }

    /// Merge a single contribution
    pub fn merge(&mut self, group: ModifierGroup, key: &str, value: f64) {
        let policy = self.stacking.resolve(group, key);
        let entries = self.group_mut(group);
        match entries.get_mut(key) {
            Some(current) => *current = policy.combine(*current, value),
            None => {
                entries.insert(key.to_string(), value);
            }
        }
    }

    /// Merge every entry of a table, in key order
    pub fn merge_table(&mut self, group: ModifierGroup, table: &ModifierTable) {
        for (key, value) in table.iter() {
            self.merge(group, key, value);
        }
    }

    pub fn get(&self, group: ModifierGroup, key: &str) -> Option<f64> {
        match group {
            ModifierGroup::Caps => self.caps.get(key).copied(),
            ModifierGroup::Bonuses => self.bonuses.get(key).copied(),
        }
    }
}
