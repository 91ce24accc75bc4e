//! Core value types shared by characters, actions and the evaluator

use crate::pack::{InventoryMode, ModifierGroup, ModifierTable};
use serde::{Deserialize, Serialize};

/// Current/maximum pair for a pool such as hit points
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceValue {
    pub current: f64,
    pub max: f64,
}

impl ResourceValue {
    /// Create a full resource
    pub fn full(max: f64) -> Self {
        let max = max.max(0.0);
        ResourceValue { current: max, max }
    }

    /// Set current, clamped to [0, max]
    pub fn set_current(&mut self, value: f64) {
        self.current = value.clamp(0.0, self.max.max(0.0));
    }

    /// Replace max and pull current down into [0, new max]; never raises current
    pub fn set_max(&mut self, max: f64) {
        self.max = max.max(0.0);
        self.current = self.current.clamp(0.0, self.max);
    }

    pub fn refill(&mut self) {
        self.current = self.max;
    }

    /// Percentage remaining, 0 when the pool is empty
    pub fn percent(&self) -> f64 {
        if self.max <= 0.0 {
            return 0.0;
        }
        (self.current / self.max * 100.0).clamp(0.0, 100.0)
    }
}

/// An item instance carried by a character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    /// Unique within one character; left empty, one is generated on add
    #[serde(default)]
    pub instance_id: String,
    /// Identifier of the item definition this instance came from
    pub content_id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Per-item cap contributions, merged before tag rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caps: Option<ModifierTable>,
    /// Per-item bonus contributions, merged before tag rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonuses: Option<ModifierTable>,
    /// Slot to auto-equip into when added
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
}

impl InventoryItem {
    pub fn new(
        instance_id: impl Into<String>,
        content_id: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        InventoryItem {
            instance_id: instance_id.into(),
            content_id: content_id.into(),
            label: label.into(),
            weight: None,
            tags: Vec::new(),
            caps: None,
            bonuses: None,
            slot: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = Some(slot.into());
        self
    }

    pub fn with_cap(mut self, key: impl Into<String>, value: f64) -> Self {
        self.caps.get_or_insert_with(ModifierTable::new).insert(key, value);
        self
    }

    pub fn with_bonus(mut self, key: impl Into<String>, value: f64) -> Self {
        self.bonuses.get_or_insert_with(ModifierTable::new).insert(key, value);
        self
    }

    /// Explicit overrides for one modifier group
    pub fn overrides(&self, group: ModifierGroup) -> Option<&ModifierTable> {
        match group {
            ModifierGroup::Caps => self.caps.as_ref(),
            ModifierGroup::Bonuses => self.bonuses.as_ref(),
        }
    }
}

/// Fixed-size set of positions for one equipment slot type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotState {
    pub max: u32,
    /// Always exactly `max` long; `None` is an empty position
    pub equipped: Vec<Option<String>>,
}

impl SlotState {
    pub fn new(max: u32) -> Self {
        SlotState {
            max,
            equipped: vec![None; max as usize],
        }
    }

    pub fn contains(&self, instance_id: &str) -> bool {
        self.equipped.iter().flatten().any(|id| id == instance_id)
    }

    pub fn first_free(&self) -> Option<usize> {
        self.equipped.iter().position(Option::is_none)
    }

    /// Empty every position holding the instance, returning whether any did
    pub fn release(&mut self, instance_id: &str) -> bool {
        let mut released = false;
        for position in self.equipped.iter_mut() {
            if position.as_deref() == Some(instance_id) {
                *position = None;
                released = true;
            }
        }
        released
    }

    pub fn occupied(&self) -> impl Iterator<Item = &str> {
        self.equipped.iter().flatten().map(String::as_str)
    }
}

/// Carried items plus the capacity figures derived from the pack
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryState {
    pub mode: InventoryMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_slots: Option<u32>,
    pub weight_limit: f64,
    #[serde(default)]
    pub items: Vec<InventoryItem>,
    pub carried_weight: f64,
}

impl InventoryState {
    pub fn item(&self, instance_id: &str) -> Option<&InventoryItem> {
        self.items.iter().find(|i| i.instance_id == instance_id)
    }

    pub fn contains(&self, instance_id: &str) -> bool {
        self.item(instance_id).is_some()
    }

    /// Recompute `carried_weight` as the sum of item weights
    pub fn refresh_weight(&mut self) {
        self.carried_weight = self.items.iter().filter_map(|i| i.weight).sum();
    }

    /// Whether the carried load exceeds what the inventory mode allows
    pub fn is_over_capacity(&self) -> bool {
        let over_slots = self
            .max_slots
            .is_some_and(|max| self.items.len() > max as usize);
        let over_weight = self.carried_weight > self.weight_limit;
        match self.mode {
            InventoryMode::SlotLimit => over_slots,
            InventoryMode::WeightLimit => over_weight,
            InventoryMode::Hybrid => over_slots || over_weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_clamps() {
        let mut hp = ResourceValue::full(20.0);
        hp.set_current(25.0);
        assert_eq!(hp.current, 20.0);
        hp.set_current(-4.0);
        assert_eq!(hp.current, 0.0);

        hp.set_current(18.0);
        hp.set_max(12.0);
        assert_eq!(hp.current, 12.0);
        hp.set_max(30.0);
        assert_eq!(hp.current, 12.0, "raising max must not raise current");
    }

    #[test]
    fn test_resource_percent() {
        let mut hp = ResourceValue::full(50.0);
        hp.set_current(25.0);
        assert!((hp.percent() - 50.0).abs() < 0.01);
        assert_eq!(ResourceValue::full(0.0).percent(), 0.0);
    }

    #[test]
    fn test_slot_positions() {
        let mut slot = SlotState::new(2);
        assert_eq!(slot.equipped.len(), 2);
        assert_eq!(slot.first_free(), Some(0));
        slot.equipped[0] = Some("ring-a".to_string());
        assert!(slot.contains("ring-a"));
        assert_eq!(slot.first_free(), Some(1));
        assert!(slot.release("ring-a"));
        assert!(!slot.release("ring-a"));
        assert_eq!(slot.equipped.len(), 2);
    }

    #[test]
    fn test_inventory_capacity() {
        let mut inv = InventoryState {
            mode: InventoryMode::Hybrid,
            max_slots: Some(1),
            weight_limit: 10.0,
            ..InventoryState::default()
        };
        inv.items.push(InventoryItem::new("a", "rope", "Rope").with_weight(4.0));
        inv.refresh_weight();
        assert!(!inv.is_over_capacity());

        inv.items.push(InventoryItem::new("b", "torch", "Torch"));
        inv.refresh_weight();
        assert_eq!(inv.carried_weight, 4.0);
        assert!(inv.is_over_capacity());

        inv.mode = InventoryMode::WeightLimit;
        assert!(!inv.is_over_capacity());
    }
}
