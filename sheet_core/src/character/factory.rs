//! CharacterFactory - build a fresh character from a pack and seed options

use super::recompute::{compute_derived, refresh_inventory, resource_max};
use super::{Character, CharacterError};
use crate::equipment::summarize;
use crate::expr::{Evaluator, Vars};
use crate::pack::Pack;
use crate::types::{InventoryItem, ResourceValue, SlotState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Explicit starting values for a resource
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceSeed {
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub current: Option<f64>,
}

/// Everything a caller may preset on a new character
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedOptions {
    pub name: String,
    pub level: Option<u32>,
    /// Starting attribute values, clamped to the attribute's bounds
    pub attributes: BTreeMap<String, f64>,
    /// Final attribute values, applied after clamping and not clamped again
    pub attribute_overrides: BTreeMap<String, f64>,
    pub resources: BTreeMap<String, ResourceSeed>,
    pub proficiencies: BTreeMap<String, String>,
    /// Starting items, auto-equipped by slot hint
    pub items: Vec<InventoryItem>,
}

impl SeedOptions {
    pub fn new(name: impl Into<String>) -> Self {
        SeedOptions {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_attribute(mut self, id: impl Into<String>, value: f64) -> Self {
        self.attributes.insert(id.into(), value);
        self
    }

    pub fn with_attribute_override(mut self, id: impl Into<String>, value: f64) -> Self {
        self.attribute_overrides.insert(id.into(), value);
        self
    }

    pub fn with_resource(mut self, id: impl Into<String>, seed: ResourceSeed) -> Self {
        self.resources.insert(id.into(), seed);
        self
    }

    pub fn with_proficiency(mut self, id: impl Into<String>, rank: impl Into<String>) -> Self {
        self.proficiencies.insert(id.into(), rank.into());
        self
    }

    pub fn with_item(mut self, item: InventoryItem) -> Self {
        self.items.push(item);
        self
    }
}

/// Builds characters
pub struct CharacterFactory;

impl CharacterFactory {
    /// Create a character
    ///
    /// Order matters: attributes and proficiencies first, then the seeded
    /// loadout (whose equipment summary is the `vars` of every formula
    /// below), then resources in declaration order, inventory capacity and
    /// finally the derived values.
    pub fn create(pack: &Pack, evaluator: &Evaluator, options: SeedOptions) -> Result<Character, CharacterError> {
        if pack.id().trim().is_empty() {
            return Err(CharacterError::MissingPackId);
        }

        let mut character = Character::blank(pack.id());
        character.name = options.name;
        character.level = options.level.unwrap_or(1).max(1);

        for def in &pack.schema.attributes {
            let seeded = options.attributes.get(&def.id).copied();
            let value = def.clamp(seeded.unwrap_or_else(|| def.default_value()));
            character.attr.insert(def.id.clone(), value);
        }
        for (id, value) in options.attribute_overrides {
            match character.attr.get_mut(&id) {
                Some(slot) => *slot = value,
                None => debug!(attribute = %id, "ignoring override for undeclared attribute"),
            }
        }

        for category in &pack.schema.proficiency_categories {
            let rank = options
                .proficiencies
                .get(&category.id)
                .cloned()
                .unwrap_or_else(|| category.default_rank().to_string());
            character.prof.insert(category.id.clone(), rank);
        }

        for slot in pack.slot_types() {
            character
                .slots
                .insert(slot.id.clone(), SlotState::new(slot.max_equipped));
        }
        for item in options.items {
            match character.insert_item(item) {
                Some(id) => {
                    character.auto_equip(&id);
                }
                None => debug!("skipping seed item with duplicate instance id"),
            }
        }
        let vars = Vars::from(summarize(&character, pack));

        // Seeded resources are visible to earlier formulas as provisional values
        for def in &pack.schema.resources {
            if let Some(seed) = options.resources.get(&def.id) {
                let max = seed.max.unwrap_or(0.0).max(0.0);
                let current = seed.current.or(seed.max).unwrap_or(0.0);
                character.res.insert(
                    def.id.clone(),
                    ResourceValue {
                        current: current.clamp(0.0, max),
                        max,
                    },
                );
            }
        }
        for def in &pack.schema.resources {
            let seed = options.resources.get(&def.id).copied().unwrap_or_default();
            let max = match seed.max {
                Some(max) => max.max(0.0),
                None => resource_max(evaluator, &def.default_max_formula, &character.context(&vars)),
            };
            let mut value = ResourceValue::full(max);
            if let Some(current) = seed.current {
                value.set_current(current);
            }
            character.res.insert(def.id.clone(), value);
        }

        refresh_inventory(&mut character, pack, evaluator, &vars);
        character.derived = compute_derived(&character, pack, evaluator, &vars);

        info!(
            pack = %pack.id(),
            name = %character.name,
            level = character.level,
            "created character"
        );
        Ok(character)
    }
}
