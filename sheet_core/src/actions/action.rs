//! Action - serializable form of every named mutation
//!
//! Callers that receive actions as data (a UI, a script, a replay log)
//! deserialize them into [`Action`], check them once against the pack with
//! [`Action::validate`] and then [`Action::apply`] them.

use super::{
    add_item, add_level, adjust_attribute, damage_resource, equip, heal_resource, long_rest,
    recompute_with_vars, remove_item, set_attribute, set_level, set_proficiency, set_resource,
    short_rest, unequip, ActionOutcome,
};
use crate::character::Character;
use crate::expr::{Evaluator, Vars};
use crate::pack::Pack;
use crate::types::InventoryItem;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An action that references something the pack does not declare
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),
    #[error("unknown resource '{0}'")]
    UnknownResource(String),
    #[error("unknown proficiency category '{0}'")]
    UnknownProficiency(String),
    #[error("proficiency '{category}' has no rank '{rank}'")]
    UnknownRank { category: String, rank: String },
    #[error("unknown slot '{0}'")]
    UnknownSlot(String),
    #[error("slot '{slot}' has {max} position(s), got index {position}")]
    InvalidPosition { slot: String, position: usize, max: u32 },
    #[error("{field} must be a non-negative number, got {value}")]
    InvalidAmount { field: &'static str, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    SetAttribute {
        id: String,
        value: f64,
    },
    AdjustAttribute {
        id: String,
        delta: f64,
    },
    SetLevel {
        level: u32,
    },
    AddLevel {
        #[serde(default = "one")]
        delta: i32,
    },
    SetResource {
        id: String,
        value: f64,
    },
    DamageResource {
        id: String,
        amount: f64,
    },
    HealResource {
        id: String,
        amount: f64,
    },
    ShortRest,
    LongRest,
    SetProficiency {
        id: String,
        rank: String,
    },
    AddItem {
        item: InventoryItem,
    },
    RemoveItem {
        instance_id: String,
    },
    Equip {
        instance_id: String,
        slot: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<usize>,
    },
    Unequip {
        instance_id: String,
    },
    RecomputeWithVars {
        #[serde(default)]
        vars: Vars,
    },
}

fn one() -> i32 {
    1
}

impl Action {
    /// The action's registry name, as used in the `type` tag
    pub fn name(&self) -> &'static str {
        match self {
            Action::SetAttribute { .. } => "set_attribute",
            Action::AdjustAttribute { .. } => "adjust_attribute",
            Action::SetLevel { .. } => "set_level",
            Action::AddLevel { .. } => "add_level",
            Action::SetResource { .. } => "set_resource",
            Action::DamageResource { .. } => "damage_resource",
            Action::HealResource { .. } => "heal_resource",
            Action::ShortRest => "short_rest",
            Action::LongRest => "long_rest",
            Action::SetProficiency { .. } => "set_proficiency",
            Action::AddItem { .. } => "add_item",
            Action::RemoveItem { .. } => "remove_item",
            Action::Equip { .. } => "equip",
            Action::Unequip { .. } => "unequip",
            Action::RecomputeWithVars { .. } => "recompute_with_vars",
        }
    }

    /// Check every pack id the action references
    ///
    /// Item instance ids belong to the character, not the pack, so they are
    /// only checked when the action is applied.
    pub fn validate(&self, pack: &Pack) -> Result<(), ActionError> {
        match self {
            Action::SetAttribute { id, .. } | Action::AdjustAttribute { id, .. } => {
                if pack.attribute(id).is_none() {
                    return Err(ActionError::UnknownAttribute(id.clone()));
                }
            }
            Action::SetResource { id, .. } => {
                if pack.resource(id).is_none() {
                    return Err(ActionError::UnknownResource(id.clone()));
                }
            }
            Action::DamageResource { id, amount } | Action::HealResource { id, amount } => {
                if pack.resource(id).is_none() {
                    return Err(ActionError::UnknownResource(id.clone()));
                }
                if amount.is_nan() || *amount < 0.0 {
                    return Err(ActionError::InvalidAmount {
                        field: "amount",
                        value: *amount,
                    });
                }
            }
            Action::SetProficiency { id, rank } => {
                let category = pack
                    .proficiency_category(id)
                    .ok_or_else(|| ActionError::UnknownProficiency(id.clone()))?;
                if !category.has_rank(rank) {
                    return Err(ActionError::UnknownRank {
                        category: id.clone(),
                        rank: rank.clone(),
                    });
                }
            }
            Action::AddItem { item } => {
                if let Some(slot) = &item.slot {
                    if pack.slot_type(slot).is_none() {
                        return Err(ActionError::UnknownSlot(slot.clone()));
                    }
                }
            }
            Action::Equip { slot, position, .. } => {
                let slot_type = pack
                    .slot_type(slot)
                    .ok_or_else(|| ActionError::UnknownSlot(slot.clone()))?;
                if let Some(position) = position {
                    if *position >= slot_type.max_equipped as usize {
                        return Err(ActionError::InvalidPosition {
                            slot: slot.clone(),
                            position: *position,
                            max: slot_type.max_equipped,
                        });
                    }
                }
            }
            Action::SetLevel { .. }
            | Action::AddLevel { .. }
            | Action::ShortRest
            | Action::LongRest
            | Action::RemoveItem { .. }
            | Action::Unequip { .. }
            | Action::RecomputeWithVars { .. } => {}
        }
        Ok(())
    }

    /// Perform the action; invalid references are no-ops
    pub fn apply(&self, character: &mut Character, pack: &Pack, evaluator: &Evaluator) -> ActionOutcome {
        tracing::trace!(action = self.name(), "applying action");
        match self {
            Action::SetAttribute { id, value } => set_attribute(character, pack, evaluator, id, *value),
            Action::AdjustAttribute { id, delta } => {
                adjust_attribute(character, pack, evaluator, id, *delta)
            }
            Action::SetLevel { level } => set_level(character, pack, evaluator, *level),
            Action::AddLevel { delta } => add_level(character, pack, evaluator, *delta),
            Action::SetResource { id, value } => set_resource(character, pack, evaluator, id, *value),
            Action::DamageResource { id, amount } => {
                damage_resource(character, pack, evaluator, id, *amount)
            }
            Action::HealResource { id, amount } => heal_resource(character, pack, evaluator, id, *amount),
            Action::ShortRest => short_rest(character, pack, evaluator),
            Action::LongRest => long_rest(character, pack, evaluator),
            Action::SetProficiency { id, rank } => set_proficiency(character, pack, evaluator, id, rank),
            Action::AddItem { item } => add_item(character, pack, evaluator, item.clone()),
            Action::RemoveItem { instance_id } => remove_item(character, pack, evaluator, instance_id),
            Action::Equip {
                instance_id,
                slot,
                position,
            } => equip(character, pack, evaluator, instance_id, slot, *position),
            Action::Unequip { instance_id } => unequip(character, pack, evaluator, instance_id),
            Action::RecomputeWithVars { vars } => recompute_with_vars(character, pack, evaluator, vars),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::{AttributeDef, InventorySchema, ProficiencyCategory, ResourceDef, SlotType};

    fn pack() -> Pack {
        let mut pack = Pack::default();
        pack.metadata.id = "test".to_string();
        pack.schema.attributes = vec![AttributeDef {
            id: "str".to_string(),
            label: None,
            min: None,
            max: None,
            default: None,
        }];
        pack.schema.resources = vec![ResourceDef {
            id: "hp".to_string(),
            label: None,
            default_max_formula: "10".to_string(),
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
        pack
    }

    #[test]
    fn test_deserialize_tagged_actions() {
        let actions: Vec<Action> = serde_json::from_str(
            r#"[
                {"type": "set_attribute", "id": "str", "value": 16},
                {"type": "add_level"},
                {"type": "long_rest"},
                {"type": "equip", "instance_id": "r1", "slot": "ring", "position": 1},
                {"type": "recompute_with_vars", "vars": {"bonuses": {"ac": 2}}},
                {"type": "add_item", "item": {"instanceId": "r1", "contentId": "ring", "tags": ["magic"]}}
            ]"#,
        )
        .unwrap();

        assert_eq!(
            actions[0],
            Action::SetAttribute {
                id: "str".to_string(),
                value: 16.0
            }
        );
        assert_eq!(actions[1], Action::AddLevel { delta: 1 });
        assert_eq!(actions[2], Action::LongRest);
        assert_eq!(actions[3].name(), "equip");
        match &actions[4] {
            Action::RecomputeWithVars { vars } => assert_eq!(vars.bonus("ac"), 2.0),
            other => panic!("unexpected {:?}", other),
        }
        match &actions[5] {
            Action::AddItem { item } => assert_eq!(item.tags, vec!["magic".to_string()]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_str::<Action>(r#"{"type": "fireball"}"#).is_err());
    }

    #[test]
    fn test_validate() {
        let pack = pack();
        let ok = [
            Action::SetAttribute {
                id: "str".to_string(),
                value: 3.0,
            },
            Action::HealResource {
                id: "hp".to_string(),
                amount: 2.0,
            },
            Action::SetProficiency {
                id: "armor".to_string(),
                rank: "trained".to_string(),
            },
            Action::Equip {
                instance_id: "anything".to_string(),
                slot: "ring".to_string(),
                position: Some(1),
            },
            Action::RemoveItem {
                instance_id: "anything".to_string(),
            },
        ];
        for action in &ok {
            assert_eq!(action.validate(&pack), Ok(()), "{:?}", action);
        }

        assert_eq!(
            Action::AdjustAttribute {
                id: "luck".to_string(),
                delta: 1.0
            }
            .validate(&pack),
            Err(ActionError::UnknownAttribute("luck".to_string()))
        );
        assert_eq!(
            Action::DamageResource {
                id: "hp".to_string(),
                amount: -1.0
            }
            .validate(&pack),
            Err(ActionError::InvalidAmount {
                field: "amount",
                value: -1.0
            })
        );
        assert_eq!(
            Action::SetProficiency {
                id: "armor".to_string(),
                rank: "legend".to_string()
            }
            .validate(&pack),
            Err(ActionError::UnknownRank {
                category: "armor".to_string(),
                rank: "legend".to_string()
            })
        );
        assert!(matches!(
            Action::Equip {
                instance_id: "r1".to_string(),
                slot: "ring".to_string(),
                position: Some(2)
            }
            .validate(&pack),
            Err(ActionError::InvalidPosition { max: 2, .. })
        ));
        assert_eq!(
            Action::AddItem {
                item: InventoryItem::new("x", "x", "X").with_slot("belt")
            }
            .validate(&pack),
            Err(ActionError::UnknownSlot("belt".to_string()))
        );
    }
}
