//! Character - the mutable sheet built from a pack
//!
//! A character is created by [`CharacterFactory`] and mutated in place by the
//! functions in [`crate::actions`]; every mutation ends with [`recompute`],
//! which keeps resource maxima, inventory capacity and derived values in step
//! with the edited fields.

mod factory;
mod recompute;

pub use factory::{CharacterFactory, ResourceSeed, SeedOptions};
pub use recompute::{recompute, recompute_with_sources};

use crate::expr::{EvalContext, Vars};
use crate::types::{InventoryItem, InventoryState, ResourceValue, SlotState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while building a character
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CharacterError {
    #[error("pack has no metadata.id")]
    MissingPackId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    // === Identity ===
    /// Id of the pack this character was built from
    pub pack_id: String,
    #[serde(default)]
    pub name: String,
    pub level: u32,

    // === Sheet ===
    pub attr: BTreeMap<String, f64>,
    pub res: BTreeMap<String, ResourceValue>,
    pub prof: BTreeMap<String, String>,
    /// Replaced wholesale on every recompute
    pub derived: BTreeMap<String, f64>,

    // === Equipment ===
    pub inventory: InventoryState,
    pub slots: BTreeMap<String, SlotState>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Character {
    /// Empty character for a pack; the factory fills in the rest
    pub(crate) fn blank(pack_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Character {
            pack_id: pack_id.into(),
            name: String::new(),
            level: 1,
            attr: BTreeMap::new(),
            res: BTreeMap::new(),
            prof: BTreeMap::new(),
            derived: BTreeMap::new(),
            inventory: InventoryState::default(),
            slots: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Read-only formula view of this character
    pub fn context<'a>(&'a self, vars: &'a Vars) -> EvalContext<'a> {
        EvalContext::for_character(self, vars)
    }

    pub fn attribute(&self, id: &str) -> Option<f64> {
        self.attr.get(id).copied()
    }

    pub fn resource(&self, id: &str) -> Option<&ResourceValue> {
        self.res.get(id)
    }

    pub fn derived_value(&self, id: &str) -> Option<f64> {
        self.derived.get(id).copied()
    }

    pub fn proficiency(&self, id: &str) -> Option<&str> {
        self.prof.get(id).map(String::as_str)
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // === Inventory ===

    pub fn is_equipped(&self, instance_id: &str) -> bool {
        self.slots.values().any(|slot| slot.contains(instance_id))
    }

    /// Slot id and position currently holding the instance
    pub fn equipped_position(&self, instance_id: &str) -> Option<(&str, usize)> {
        self.slots.iter().find_map(|(id, slot)| {
            slot.equipped
                .iter()
                .position(|p| p.as_deref() == Some(instance_id))
                .map(|index| (id.as_str(), index))
        })
    }

    /// Equipped items, in inventory order
    pub fn equipped_items(&self) -> impl Iterator<Item = &InventoryItem> {
        self.inventory
            .items
            .iter()
            .filter(|item| self.is_equipped(&item.instance_id))
    }

    /// Add an item, generating an instance id when it has none
    ///
    /// Returns the instance id, or `None` when an item with the same id is
    /// already carried.
    pub(crate) fn insert_item(&mut self, mut item: InventoryItem) -> Option<String> {
        if item.instance_id.trim().is_empty() {
            item.instance_id = Uuid::new_v4().to_string();
        }
        if self.inventory.contains(&item.instance_id) {
            return None;
        }
        let id = item.instance_id.clone();
        self.inventory.items.push(item);
        self.inventory.refresh_weight();
        Some(id)
    }

    /// Remove an item, emptying any slot position that held it
    pub(crate) fn take_item(&mut self, instance_id: &str) -> Option<InventoryItem> {
        let index = self
            .inventory
            .items
            .iter()
            .position(|item| item.instance_id == instance_id)?;
        self.release(instance_id);
        let item = self.inventory.items.remove(index);
        self.inventory.refresh_weight();
        Some(item)
    }

    /// Put a carried item into a slot
    ///
    /// With an explicit position the occupant there is replaced; otherwise
    /// the first free position is used and a full slot is left alone. The
    /// item leaves any other position first. Returns whether anything
    /// changed.
    pub(crate) fn place(&mut self, instance_id: &str, slot_id: &str, position: Option<usize>) -> bool {
        if !self.inventory.contains(instance_id) {
            return false;
        }
        let Some(slot) = self.slots.get(slot_id) else {
            return false;
        };
        let index = match position {
            Some(index) if index < slot.equipped.len() => {
                if slot.equipped[index].as_deref() == Some(instance_id) {
                    return false;
                }
                index
            }
            Some(_) => return false,
            None => {
                if slot.contains(instance_id) {
                    return false;
                }
                match slot.first_free() {
                    Some(index) => index,
                    None => return false,
                }
            }
        };

        self.release(instance_id);
        if let Some(slot) = self.slots.get_mut(slot_id) {
            slot.equipped[index] = Some(instance_id.to_string());
        }
        true
    }

    /// Equip into the item's slot hint, if it has one
    pub(crate) fn auto_equip(&mut self, instance_id: &str) -> bool {
        let hint = self
            .inventory
            .item(instance_id)
            .and_then(|item| item.slot.clone());
        match hint {
            Some(slot_id) => self.place(instance_id, &slot_id, None),
            None => false,
        }
    }

    /// Empty every position holding the instance
    pub(crate) fn release(&mut self, instance_id: &str) -> bool {
        let mut released = false;
        for slot in self.slots.values_mut() {
            released |= slot.release(instance_id);
        }
        released
    }
}
