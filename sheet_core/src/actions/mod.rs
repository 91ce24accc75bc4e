//! Actions - the named mutations a caller may perform on a character
//!
//! Every action edits one part of the sheet and then runs
//! [`recompute`](crate::character::recompute). Actions that reference an id
//! the pack or character does not know are silent no-ops: the character is
//! left untouched, no recompute runs and [`ActionOutcome::Unchanged`] is
//! returned.

mod action;

pub use action::{Action, ActionError};

use crate::character::{recompute, Character};
use crate::expr::{Evaluator, Vars};
use crate::pack::Pack;
use crate::types::InventoryItem;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Whether an action changed the character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    Applied,
    Unchanged,
}

impl ActionOutcome {
    pub fn is_applied(self) -> bool {
        self == ActionOutcome::Applied
    }
}

fn finish(character: &mut Character, pack: &Pack, evaluator: &Evaluator) -> ActionOutcome {
    recompute(character, pack, evaluator, None);
    ActionOutcome::Applied
}

fn unchanged(action: &'static str, reason: &str) -> ActionOutcome {
    debug!(action, reason, "action left character unchanged");
    ActionOutcome::Unchanged
}

// === Attributes & level ===

/// Set an attribute, clamped to its declared bounds
pub fn set_attribute(
    character: &mut Character,
    pack: &Pack,
    evaluator: &Evaluator,
    id: &str,
    value: f64,
) -> ActionOutcome {
    let Some(def) = pack.attribute(id) else {
        return unchanged("set_attribute", "unknown attribute");
    };
    let Some(current) = character.attr.get_mut(id) else {
        return unchanged("set_attribute", "attribute missing on character");
    };
    if value.is_nan() {
        return unchanged("set_attribute", "value is not a number");
    }
    *current = def.clamp(value);
    finish(character, pack, evaluator)
}

/// Add `delta` to an attribute, clamped to its declared bounds
pub fn adjust_attribute(
    character: &mut Character,
    pack: &Pack,
    evaluator: &Evaluator,
    id: &str,
    delta: f64,
) -> ActionOutcome {
    match character.attribute(id) {
        Some(current) => set_attribute(character, pack, evaluator, id, current + delta),
        None => unchanged("adjust_attribute", "unknown attribute"),
    }
}

pub fn set_level(character: &mut Character, pack: &Pack, evaluator: &Evaluator, level: u32) -> ActionOutcome {
    character.level = level.max(1);
    finish(character, pack, evaluator)
}

/// Raise (or with a negative delta, lower) the level; never below 1
pub fn add_level(character: &mut Character, pack: &Pack, evaluator: &Evaluator, delta: i32) -> ActionOutcome {
    let level = (i64::from(character.level) + i64::from(delta)).clamp(1, i64::from(u32::MAX));
    set_level(character, pack, evaluator, level as u32)
}

// === Resources ===

/// Set a resource's current value, clamped to [0, max]
pub fn set_resource(
    character: &mut Character,
    pack: &Pack,
    evaluator: &Evaluator,
    id: &str,
    value: f64,
) -> ActionOutcome {
    let Some(resource) = character.res.get_mut(id) else {
        return unchanged("set_resource", "unknown resource");
    };
    if value.is_nan() {
        return unchanged("set_resource", "value is not a number");
    }
    resource.set_current(value);
    finish(character, pack, evaluator)
}

pub fn damage_resource(
    character: &mut Character,
    pack: &Pack,
    evaluator: &Evaluator,
    id: &str,
    amount: f64,
) -> ActionOutcome {
    if amount.is_nan() || amount < 0.0 {
        return unchanged("damage_resource", "amount must be non-negative");
    }
    match character.resource(id) {
        Some(resource) => {
            let value = resource.current - amount;
            set_resource(character, pack, evaluator, id, value)
        }
        None => unchanged("damage_resource", "unknown resource"),
    }
}

pub fn heal_resource(
    character: &mut Character,
    pack: &Pack,
    evaluator: &Evaluator,
    id: &str,
    amount: f64,
) -> ActionOutcome {
    if amount.is_nan() || amount < 0.0 {
        return unchanged("heal_resource", "amount must be non-negative");
    }
    match character.resource(id) {
        Some(resource) => {
            let value = resource.current + amount;
            set_resource(character, pack, evaluator, id, value)
        }
        None => unchanged("heal_resource", "unknown resource"),
    }
}

/// Recompute only; resources are not restored
pub fn short_rest(character: &mut Character, pack: &Pack, evaluator: &Evaluator) -> ActionOutcome {
    finish(character, pack, evaluator)
}

/// Restore every resource to its maximum, then recompute
pub fn long_rest(character: &mut Character, pack: &Pack, evaluator: &Evaluator) -> ActionOutcome {
    for resource in character.res.values_mut() {
        resource.refill();
    }
    finish(character, pack, evaluator)
}

// === Proficiencies ===

/// Set a proficiency rank; the rank must be one the category declares
pub fn set_proficiency(
    character: &mut Character,
    pack: &Pack,
    evaluator: &Evaluator,
    id: &str,
    rank: &str,
) -> ActionOutcome {
    let Some(category) = pack.proficiency_category(id) else {
        return unchanged("set_proficiency", "unknown proficiency category");
    };
    if !category.has_rank(rank) {
        return unchanged("set_proficiency", "unknown rank");
    }
    character.prof.insert(id.to_string(), rank.to_string());
    finish(character, pack, evaluator)
}

// === Inventory ===

/// Add an item, auto-equipping it when it carries a slot hint
///
/// An empty instance id is replaced with a fresh UUID. Adding an id that is
/// already carried does nothing.
pub fn add_item(
    character: &mut Character,
    pack: &Pack,
    evaluator: &Evaluator,
    item: InventoryItem,
) -> ActionOutcome {
    let Some(id) = character.insert_item(item) else {
        return unchanged("add_item", "duplicate instance id");
    };
    character.auto_equip(&id);
    finish(character, pack, evaluator)
}

/// Remove an item, unequipping it first
pub fn remove_item(
    character: &mut Character,
    pack: &Pack,
    evaluator: &Evaluator,
    instance_id: &str,
) -> ActionOutcome {
    match character.take_item(instance_id) {
        Some(_) => finish(character, pack, evaluator),
        None => unchanged("remove_item", "unknown item"),
    }
}

/// Equip a carried item
///
/// With a position the occupant there is replaced; without one the first
/// free position is taken and a full slot is left alone.
pub fn equip(
    character: &mut Character,
    pack: &Pack,
    evaluator: &Evaluator,
    instance_id: &str,
    slot: &str,
    position: Option<usize>,
) -> ActionOutcome {
    if character.place(instance_id, slot, position) {
        finish(character, pack, evaluator)
    } else {
        unchanged("equip", "item, slot or position unavailable")
    }
}

pub fn unequip(
    character: &mut Character,
    pack: &Pack,
    evaluator: &Evaluator,
    instance_id: &str,
) -> ActionOutcome {
    if character.release(instance_id) {
        finish(character, pack, evaluator)
    } else {
        unchanged("unequip", "item not equipped")
    }
}

/// Recompute with caller-supplied vars layered over the equipment summary
pub fn recompute_with_vars(
    character: &mut Character,
    pack: &Pack,
    evaluator: &Evaluator,
    vars: &Vars,
) -> ActionOutcome {
    recompute(character, pack, evaluator, Some(vars));
    ActionOutcome::Applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{CharacterFactory, SeedOptions};
    use crate::pack::{
        AttributeDef, DerivedDef, InventorySchema, ProficiencyCategory, ResourceDef, SlotType,
    };
    use crate::types::ResourceValue;

    fn pack() -> Pack {
        let mut pack = Pack::default();
        pack.metadata.id = "test".to_string();
        pack.schema.attributes = vec![AttributeDef {
            id: "con".to_string(),
            label: None,
            min: Some(1.0),
            max: Some(20.0),
            default: Some(14.0),
        }];
        pack.schema.resources = vec![ResourceDef {
            id: "hp".to_string(),
            label: None,
            default_max_formula: "6 + mod(attr.con) * level".to_string(),
        }];
        pack.schema.proficiency_categories = vec![ProficiencyCategory {
            id: "armor".to_string(),
            label: None,
            ranks: vec!["none".to_string(), "trained".to_string()],
        }];
        pack.schema.inventory = Some(InventorySchema {
            slot_types: vec![SlotType {
                id: "ring".to_string(),
                label: None,
                max_equipped: 2,
            }],
            ..InventorySchema::default()
        });
        pack.schema.derived = vec![DerivedDef {
            id: "tier".to_string(),
            label: None,
            formula: "prof.armor == 'trained' ? 2 : 0".to_string(),
        }];
        pack
    }

    fn setup() -> (Pack, Evaluator, Character) {
        let pack = pack();
        let evaluator = Evaluator::for_pack(&pack);
        let character = CharacterFactory::create(&pack, &evaluator, SeedOptions::default()).unwrap();
        (pack, evaluator, character)
    }

    #[test]
    fn test_attribute_actions_clamp_and_recompute() {
        let (pack, ev, mut c) = setup();
        assert_eq!(c.res["hp"].max, 8.0);

        assert!(set_attribute(&mut c, &pack, &ev, "con", 40.0).is_applied());
        assert_eq!(c.attribute("con"), Some(20.0));
        assert_eq!(c.res["hp"].max, 11.0);

        adjust_attribute(&mut c, &pack, &ev, "con", -30.0);
        assert_eq!(c.attribute("con"), Some(1.0));
        assert_eq!(c.res["hp"], ResourceValue { current: 1.0, max: 1.0 });
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let (pack, ev, mut c) = setup();
        let before = c.clone();
        assert_eq!(set_attribute(&mut c, &pack, &ev, "luck", 3.0), ActionOutcome::Unchanged);
        assert_eq!(adjust_attribute(&mut c, &pack, &ev, "luck", 3.0), ActionOutcome::Unchanged);
        assert_eq!(set_resource(&mut c, &pack, &ev, "mana", 3.0), ActionOutcome::Unchanged);
        assert_eq!(damage_resource(&mut c, &pack, &ev, "mana", 3.0), ActionOutcome::Unchanged);
        assert_eq!(set_proficiency(&mut c, &pack, &ev, "armor", "master"), ActionOutcome::Unchanged);
        assert_eq!(remove_item(&mut c, &pack, &ev, "ghost"), ActionOutcome::Unchanged);
        assert_eq!(unequip(&mut c, &pack, &ev, "ghost"), ActionOutcome::Unchanged);
        assert_eq!(c, before, "no recompute, no timestamp change");
    }

    #[test]
    fn test_level_floor() {
        let (pack, ev, mut c) = setup();
        add_level(&mut c, &pack, &ev, 2);
        assert_eq!(c.level, 3);
        assert_eq!(c.res["hp"].max, 12.0);
        add_level(&mut c, &pack, &ev, -10);
        assert_eq!(c.level, 1);
        set_level(&mut c, &pack, &ev, 0);
        assert_eq!(c.level, 1);
    }

    #[test]
    fn test_damage_heal_and_rests() {
        let (pack, ev, mut c) = setup();
        damage_resource(&mut c, &pack, &ev, "hp", 5.0);
        assert_eq!(c.res["hp"].current, 3.0);
        assert_eq!(damage_resource(&mut c, &pack, &ev, "hp", -5.0), ActionOutcome::Unchanged);
        assert_eq!(heal_resource(&mut c, &pack, &ev, "hp", f64::NAN), ActionOutcome::Unchanged);
        damage_resource(&mut c, &pack, &ev, "hp", 50.0);
        assert_eq!(c.res["hp"].current, 0.0);
        heal_resource(&mut c, &pack, &ev, "hp", 2.0);
        assert_eq!(c.res["hp"].current, 2.0);

        assert!(short_rest(&mut c, &pack, &ev).is_applied());
        assert_eq!(c.res["hp"].current, 2.0);
        assert!(long_rest(&mut c, &pack, &ev).is_applied());
        assert_eq!(c.res["hp"].current, 8.0);
    }

    #[test]
    fn test_set_proficiency_recomputes() {
        let (pack, ev, mut c) = setup();
        assert_eq!(c.derived_value("tier"), Some(0.0));
        assert!(set_proficiency(&mut c, &pack, &ev, "armor", "trained").is_applied());
        assert_eq!(c.derived_value("tier"), Some(2.0));
    }

    #[test]
    fn test_item_lifecycle() {
        let (pack, ev, mut c) = setup();
        let ring = InventoryItem::new("r1", "ring", "Ring").with_slot("ring").with_weight(0.5);
        assert!(add_item(&mut c, &pack, &ev, ring.clone()).is_applied());
        assert!(c.is_equipped("r1"));
        assert_eq!(add_item(&mut c, &pack, &ev, ring), ActionOutcome::Unchanged);

        assert!(add_item(&mut c, &pack, &ev, InventoryItem::new("", "ring", "Spare")).is_applied());
        let spare = c.inventory.items[1].instance_id.clone();
        assert!(!spare.is_empty());
        assert!(!c.is_equipped(&spare));

        assert!(equip(&mut c, &pack, &ev, &spare, "ring", Some(0)).is_applied());
        assert!(!c.is_equipped("r1"), "explicit position replaces occupant");
        assert_eq!(equip(&mut c, &pack, &ev, &spare, "ring", Some(2)), ActionOutcome::Unchanged);

        assert!(unequip(&mut c, &pack, &ev, &spare).is_applied());
        assert!(remove_item(&mut c, &pack, &ev, "r1").is_applied());
        assert_eq!(c.inventory.items.len(), 1);
        assert_eq!(c.inventory.carried_weight, 0.0);
    }

    #[test]
    fn test_recompute_with_vars() {
        let (pack, ev, mut c) = setup();
        let vars = Vars::new().with("ignored", 1.0);
        assert!(recompute_with_vars(&mut c, &pack, &ev, &vars).is_applied());
        assert_eq!(c.derived_value("tier"), Some(0.0));
    }
}
