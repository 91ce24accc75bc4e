//! Pack - the immutable rule document a character is built from
//!
//! A pack is produced once by the loader in [`crate::config`] (parse,
//! normalize, validate) and is only ever read by the engine afterwards.

mod modifier_table;

pub use modifier_table::{parse_rule_number, ModifierTable};

use crate::lookup::LookupTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fallback value for attributes that declare no default
pub const DEFAULT_ATTRIBUTE_VALUE: f64 = 10.0;

/// Rank given to proficiencies whose category declares no ranks
pub const UNTRAINED_RANK: &str = "untrained";

/// Complete rule pack
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pack {
    #[serde(default)]
    pub metadata: PackMetadata,
    #[serde(default)]
    pub schema: PackSchema,
    #[serde(default)]
    pub rules: PackRules,
    /// Legacy location of the inventory model, read when `schema.inventory` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mechanics: Option<LegacyMechanics>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PackMetadata {
    /// Stable system identifier, required to create characters
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackSchema {
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
    #[serde(default)]
    pub resources: Vec<ResourceDef>,
    #[serde(default)]
    pub proficiency_categories: Vec<ProficiencyCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<InventorySchema>,
    /// Legacy slot list; normalization copies it into the inventory's slot types
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub item_slots: Vec<SlotType>,
    /// Derived values, evaluated in declaration order
    #[serde(default)]
    pub derived: Vec<DerivedDef>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LegacyMechanics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<InventorySchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<f64>,
}

impl AttributeDef {
    /// Clamp a value to this attribute's bounds (open ends are unbounded)
    pub fn clamp(&self, value: f64) -> f64 {
        let lo = self.min.unwrap_or(f64::NEG_INFINITY);
        let hi = self.max.unwrap_or(f64::INFINITY);
        value.max(lo).min(hi)
    }

    /// Starting value before seeding
    pub fn default_value(&self) -> f64 {
        self.default.unwrap_or(DEFAULT_ATTRIBUTE_VALUE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default = "default_formula")]
    pub default_max_formula: String,
}

fn default_formula() -> String {
    "0".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProficiencyCategory {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Ordered rank names, the first one is the default
    #[serde(default)]
    pub ranks: Vec<String>,
}

impl ProficiencyCategory {
    pub fn default_rank(&self) -> &str {
        self.ranks.first().map(String::as_str).unwrap_or(UNTRAINED_RANK)
    }

    pub fn has_rank(&self, rank: &str) -> bool {
        self.ranks.iter().any(|r| r == rank)
    }
}

/// How inventory capacity is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryMode {
    #[default]
    SlotLimit,
    WeightLimit,
    Hybrid,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySchema {
    #[serde(default)]
    pub mode: InventoryMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_slots: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_limit_formula: Option<String>,
    #[serde(default)]
    pub slot_types: Vec<SlotType>,
}

/// An equipment slot and how many items it holds at once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotType {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default = "default_max_equipped")]
    pub max_equipped: u32,
}

fn default_max_equipped() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedDef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub formula: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackRules {
    #[serde(default)]
    pub lookups: BTreeMap<String, LookupTable>,
    /// tag -> cap key -> value
    #[serde(default)]
    pub tag_caps: BTreeMap<String, ModifierTable>,
    /// tag -> bonus key -> value
    #[serde(default)]
    pub tag_bonuses: BTreeMap<String, ModifierTable>,
    #[serde(default)]
    pub stacking: StackingRules,
}

/// The two modifier families items contribute to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierGroup {
    Caps,
    Bonuses,
}

impl ModifierGroup {
    /// Policy used when neither a per-key nor a `default` entry exists
    pub fn fallback_policy(self) -> StackingPolicy {
        match self {
            ModifierGroup::Caps => StackingPolicy::Min,
            ModifierGroup::Bonuses => StackingPolicy::Sum,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModifierGroup::Caps => "caps",
            ModifierGroup::Bonuses => "bonuses",
        }
    }
}

/// How contributions to the same key combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackingPolicy {
    Min,
    Max,
    Sum,
}

impl StackingPolicy {
    /// Combine the running value with an incoming contribution
    pub fn combine(self, current: f64, incoming: f64) -> f64 {
        match self {
            StackingPolicy::Min => current.min(incoming),
            StackingPolicy::Max => current.max(incoming),
            StackingPolicy::Sum => current + incoming,
        }
    }
}

/// Key under which a stacking table stores its group-wide policy
pub const STACKING_DEFAULT_KEY: &str = "default";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StackingRules {
    #[serde(default)]
    pub caps: BTreeMap<String, StackingPolicy>,
    #[serde(default)]
    pub bonuses: BTreeMap<String, StackingPolicy>,
}

impl StackingRules {
    pub fn table(&self, group: ModifierGroup) -> &BTreeMap<String, StackingPolicy> {
        match group {
            ModifierGroup::Caps => &self.caps,
            ModifierGroup::Bonuses => &self.bonuses,
        }
    }

    pub fn table_mut(&mut self, group: ModifierGroup) -> &mut BTreeMap<String, StackingPolicy> {
        match group {
            ModifierGroup::Caps => &mut self.caps,
            ModifierGroup::Bonuses => &mut self.bonuses,
        }
    }

    /// Per-key override, else the group's `default`, else the hardcoded fallback
    pub fn resolve(&self, group: ModifierGroup, key: &str) -> StackingPolicy {
        let table = self.table(group);
        table
            .get(key)
            .or_else(|| table.get(STACKING_DEFAULT_KEY))
            .copied()
            .unwrap_or_else(|| group.fallback_policy())
    }
}

impl Pack {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn attribute(&self, id: &str) -> Option<&AttributeDef> {
        self.schema.attributes.iter().find(|a| a.id == id)
    }

    pub fn resource(&self, id: &str) -> Option<&ResourceDef> {
        self.schema.resources.iter().find(|r| r.id == id)
    }

    pub fn proficiency_category(&self, id: &str) -> Option<&ProficiencyCategory> {
        self.schema.proficiency_categories.iter().find(|p| p.id == id)
    }

    /// Effective inventory model: `schema.inventory` wins over `mechanics.inventory`
    pub fn inventory_schema(&self) -> Option<&InventorySchema> {
        self.schema
            .inventory
            .as_ref()
            .or_else(|| self.mechanics.as_ref().and_then(|m| m.inventory.as_ref()))
    }

    /// Equipment slots of the effective inventory model
    pub fn slot_types(&self) -> &[SlotType] {
        self.inventory_schema()
            .map(|inv| inv.slot_types.as_slice())
            .unwrap_or(&[])
    }

    pub fn slot_type(&self, id: &str) -> Option<&SlotType> {
        self.slot_types().iter().find(|s| s.id == id)
    }

    /// Tag rule table for one modifier group
    pub fn tag_rules(&self, group: ModifierGroup, tag: &str) -> Option<&ModifierTable> {
        match group {
            ModifierGroup::Caps => self.rules.tag_caps.get(tag),
            ModifierGroup::Bonuses => self.rules.tag_bonuses.get(tag),
        }
    }
}
