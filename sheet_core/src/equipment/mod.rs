//! Equipment aggregation - caps and bonuses from equipped items
//!
//! Equipped items are visited in inventory order. For each item its explicit
//! overrides merge first, then the pack's tag rules in the item's tag order.
//! Each key combines under the policy [`StackingRules::resolve`] picks for
//! it. The resulting summary becomes `vars.caps` / `vars.bonuses` for every
//! formula evaluated during a recompute.
//!
//! [`StackingRules::resolve`]: crate::pack::StackingRules::resolve

mod accumulator;
mod source;

pub use accumulator::ModifierAccumulator;
pub use source::{FlatSource, ItemSource, ModifierSource};

use crate::character::Character;
use crate::expr::{VarValue, Vars, BONUSES_VAR, CAPS_VAR};
use crate::pack::Pack;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregated equipment modifiers
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EquipmentSummary {
    pub caps: BTreeMap<String, f64>,
    pub bonuses: BTreeMap<String, f64>,
}

impl EquipmentSummary {
    pub fn is_empty(&self) -> bool {
        self.caps.is_empty() && self.bonuses.is_empty()
    }
}

impl From<ModifierAccumulator<'_>> for EquipmentSummary {
    fn from(acc: ModifierAccumulator<'_>) -> Self {
        EquipmentSummary {
            caps: acc.caps,
            bonuses: acc.bonuses,
        }
    }
}

impl From<EquipmentSummary> for Vars {
    fn from(summary: EquipmentSummary) -> Self {
        Vars::new()
            .with(CAPS_VAR, VarValue::from(summary.caps))
            .with(BONUSES_VAR, VarValue::from(summary.bonuses))
    }
}

/// Summarize the character's equipped items under the pack's rules
pub fn summarize(character: &Character, pack: &Pack) -> EquipmentSummary {
    summarize_with(character, pack, &[])
}

/// Summarize equipped items, then fold in extra sources in the given order
pub fn summarize_with(
    character: &Character,
    pack: &Pack,
    extra: &[&dyn ModifierSource],
) -> EquipmentSummary {
    let mut acc = ModifierAccumulator::new(&pack.rules.stacking);
    for item in character.equipped_items() {
        ItemSource::new(item, pack).apply(&mut acc);
    }
    for source in extra {
        tracing::trace!(source = source.id(), "applying extra modifier source");
        source.apply(&mut acc);
    }
    acc.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::{
        InventorySchema, ModifierTable, SlotType, StackingPolicy, STACKING_DEFAULT_KEY,
    };
    use crate::types::{InventoryItem, SlotState};

    fn pack() -> Pack {
        let mut pack = Pack::default();
        pack.metadata.id = "test".to_string();
        pack.schema.inventory = Some(InventorySchema {
            slot_types: vec![
                SlotType {
                    id: "armor".to_string(),
                    label: None,
                    max_equipped: 1,
                },
                SlotType {
                    id: "off_hand".to_string(),
                    label: None,
                    max_equipped: 1,
                },
            ],
            ..InventorySchema::default()
        });
        pack.rules
            .tag_caps
            .insert("heavy".to_string(), ModifierTable::new().with("ac.dex", 0.0));
        pack.rules
            .tag_caps
            .insert("medium".to_string(), ModifierTable::new().with("ac.dex", 2.0));
        pack.rules
            .tag_bonuses
            .insert("shield".to_string(), ModifierTable::new().with("ac.shield", 2.0));
        pack
    }

    fn character(pack: &Pack, items: Vec<(InventoryItem, &str)>) -> Character {
        let mut c = Character::blank(pack.id());
        for slot in pack.slot_types() {
            c.slots.insert(slot.id.clone(), SlotState::new(slot.max_equipped));
        }
        for (item, slot) in items {
            let id = c.insert_item(item).unwrap();
            assert!(c.place(&id, slot, None));
        }
        c
    }

    #[test]
    fn test_tag_rules_and_summary_vars() {
        let pack = pack();
        let c = character(
            &pack,
            vec![
                (InventoryItem::new("plate", "plate", "Plate").with_tag("heavy"), "armor"),
                (InventoryItem::new("shield", "shield", "Shield").with_tag("shield"), "off_hand"),
            ],
        );

        let summary = summarize(&c, &pack);
        assert_eq!(summary.caps.get("ac.dex"), Some(&0.0));
        assert_eq!(summary.bonuses.get("ac.shield"), Some(&2.0));

        let vars = Vars::from(summary);
        assert_eq!(vars.cap_value("ac.dex"), 0.0);
        assert_eq!(vars.bonus("ac.shield"), 2.0);
    }

    #[test]
    fn test_unequipped_items_do_not_count() {
        let pack = pack();
        let mut c = character(&pack, vec![]);
        c.insert_item(InventoryItem::new("plate", "plate", "Plate").with_tag("heavy"));
        assert!(summarize(&c, &pack).is_empty());
    }

    #[test]
    fn test_overrides_and_tags_both_contribute() {
        let pack = pack();
        let item = InventoryItem::new("plate", "plate", "Plate")
            .with_tag("heavy")
            .with_tag("shield")
            .with_cap("ac.dex", 1.0)
            .with_bonus("ac.shield", 1.0);
        let c = character(&pack, vec![(item, "armor")]);
        let summary = summarize(&c, &pack);
        assert_eq!(summary.caps.get("ac.dex"), Some(&0.0));
        assert_eq!(summary.bonuses.get("ac.shield"), Some(&3.0));
    }

    #[test]
    fn test_per_key_policy_across_tags() {
        let mut pack = pack();
        pack.rules
            .tag_bonuses
            .insert("big".to_string(), ModifierTable::new().with("speed", -10.0));
        pack.rules
            .tag_bonuses
            .insert("quick".to_string(), ModifierTable::new().with("speed", 5.0));
        pack.rules
            .stacking
            .bonuses
            .insert(STACKING_DEFAULT_KEY.to_string(), StackingPolicy::Max);
        pack.rules.stacking.bonuses.insert("ac.shield".to_string(), StackingPolicy::Sum);

        let item = InventoryItem::new("boots", "boots", "Boots")
            .with_tag("quick")
            .with_tag("big")
            .with_tag("shield")
            .with_bonus("ac.shield", 1.0);
        let c = character(&pack, vec![(item, "armor")]);
        let summary = summarize(&c, &pack);
        assert_eq!(summary.bonuses.get("speed"), Some(&5.0));
        assert_eq!(summary.bonuses.get("ac.shield"), Some(&3.0));
    }

    #[test]
    fn test_default_policies_across_items() {
        let pack = pack();
        let c = character(
            &pack,
            vec![
                (InventoryItem::new("a", "a", "A").with_tag("medium").with_bonus("ac", 1.0), "armor"),
                (InventoryItem::new("b", "b", "B").with_tag("heavy").with_bonus("ac", 1.0), "off_hand"),
            ],
        );
        let summary = summarize(&c, &pack);
        assert_eq!(summary.caps.get("ac.dex"), Some(&0.0), "caps default to min");
        assert_eq!(summary.bonuses.get("ac"), Some(&2.0), "bonuses default to sum");
    }

    #[test]
    fn test_extra_sources_fold_in_after_items() {
        let pack = pack();
        let c = character(
            &pack,
            vec![(InventoryItem::new("shield", "shield", "Shield").with_tag("shield"), "off_hand")],
        );
        let spell = FlatSource::new("shield_of_faith").with_bonus("ac.shield", 2.0);
        let summary = summarize_with(&c, &pack, &[&spell]);
        assert_eq!(summary.bonuses.get("ac.shield"), Some(&4.0));
    }
}
