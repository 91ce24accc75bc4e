//! ModifierSource - Trait and implementations for cap/bonus providers

use super::ModifierAccumulator;
use crate::pack::{ModifierGroup, ModifierTable, Pack};
use crate::types::InventoryItem;

/// Anything that contributes caps or bonuses to an equipment summary
pub trait ModifierSource: Send + Sync {
    /// Identifier for logging and debugging
    fn id(&self) -> &str;

    /// Apply this source's contributions to the accumulator
    fn apply(&self, acc: &mut ModifierAccumulator<'_>);
}

/// Contributions of one equipped item
///
/// Explicit overrides on the item merge first, then the pack's tag rules for
/// each tag in the item's own tag order.
pub struct ItemSource<'a> {
    pub item: &'a InventoryItem,
    pub pack: &'a Pack,
}

impl<'a> ItemSource<'a> {
    pub fn new(item: &'a InventoryItem, pack: &'a Pack) -> Self {
        ItemSource { item, pack }
    }
}

impl ModifierSource for ItemSource<'_> {
    fn id(&self) -> &str {
        &self.item.instance_id
    }

    fn apply(&self, acc: &mut ModifierAccumulator<'_>) {
        for group in [ModifierGroup::Caps, ModifierGroup::Bonuses] {
            if let Some(table) = self.item.overrides(group) {
                acc.merge_table(group, table);
            }
        }
        for tag in &self.item.tags {
            for group in [ModifierGroup::Caps, ModifierGroup::Bonuses] {
                if let Some(table) = self.pack.tag_rules(group, tag) {
                    acc.merge_table(group, table);
                }
            }
        }
    }
}

/// Caller-supplied contributions, e.g. a spell or a situational effect
#[derive(Debug, Clone, Default)]
pub struct FlatSource {
    pub name: String,
    pub caps: ModifierTable,
    pub bonuses: ModifierTable,
}

impl FlatSource {
    pub fn new(name: impl Into<String>) -> Self {
        FlatSource {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_cap(mut self, key: impl Into<String>, value: f64) -> Self {
        self.caps.insert(key, value);
        self
    }

    pub fn with_bonus(mut self, key: impl Into<String>, value: f64) -> Self {
        self.bonuses.insert(key, value);
        self
    }
}

impl ModifierSource for FlatSource {
    fn id(&self) -> &str {
        &self.name
    }

    fn apply(&self, acc: &mut ModifierAccumulator<'_>) {
        acc.merge_table(ModifierGroup::Caps, &self.caps);
        acc.merge_table(ModifierGroup::Bonuses, &self.bonuses);
    }
}
