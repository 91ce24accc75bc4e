//! Pack normalization
//!
//! Rewrites legacy and implicit parts of a pack into the one shape the engine
//! reads. Applying it twice gives the same pack as applying it once.

use crate::pack::{InventorySchema, ModifierGroup, Pack, STACKING_DEFAULT_KEY};

/// Normalize a freshly parsed pack
///
/// - legacy `schema.itemSlots` fill the effective inventory's `slotTypes`
///   when that list is empty; `schema.inventory` is created when neither
///   inventory location exists
/// - `rules.stacking.caps.default` becomes `min` and
///   `rules.stacking.bonuses.default` becomes `sum` unless set
///
/// Tag-rule numbers written as strings are coerced while deserializing and
/// need nothing here.
pub fn normalize(mut pack: Pack) -> Pack {
    copy_legacy_item_slots(&mut pack);

    for group in [ModifierGroup::Caps, ModifierGroup::Bonuses] {
        pack.rules
            .stacking
            .table_mut(group)
            .entry(STACKING_DEFAULT_KEY.to_string())
            .or_insert_with(|| group.fallback_policy());
    }
    pack
}

fn copy_legacy_item_slots(pack: &mut Pack) {
    if pack.schema.item_slots.is_empty() {
        return;
    }
    let legacy = pack.schema.item_slots.clone();

    let inventory = if pack.schema.inventory.is_some() {
        pack.schema.inventory.as_mut()
    } else if pack.mechanics.as_ref().is_some_and(|m| m.inventory.is_some()) {
        pack.mechanics.as_mut().and_then(|m| m.inventory.as_mut())
    } else {
        Some(pack.schema.inventory.get_or_insert_with(InventorySchema::default))
    };

    if let Some(inventory) = inventory {
        if inventory.slot_types.is_empty() {
            inventory.slot_types = legacy;
        }
    }
}
