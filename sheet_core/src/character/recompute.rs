//! Recompute - re-derive everything that depends on edited fields

use super::Character;
use crate::equipment::{summarize_with, ModifierSource};
use crate::expr::{EvalContext, Evaluator, Vars};
use crate::pack::Pack;
use crate::types::ResourceValue;
use std::collections::BTreeMap;
use tracing::debug;

/// Recompute resource maxima, inventory capacity and derived values
///
/// Equipment is summarized into `vars.caps` / `vars.bonuses`; `transient`
/// vars replace those (or add to them) per top-level key. Current resource
/// values are clamped into the new maxima, never raised.
pub fn recompute(character: &mut Character, pack: &Pack, evaluator: &Evaluator, transient: Option<&Vars>) {
    recompute_with_sources(character, pack, evaluator, &[], transient);
}

/// Recompute with extra modifier sources folded into the equipment summary
pub fn recompute_with_sources(
    character: &mut Character,
    pack: &Pack,
    evaluator: &Evaluator,
    extra: &[&dyn ModifierSource],
    transient: Option<&Vars>,
) {
    let mut vars = Vars::from(summarize_with(character, pack, extra));
    if let Some(transient) = transient {
        vars.overlay(transient);
    }

    for def in &pack.schema.resources {
        let max = resource_max(evaluator, &def.default_max_formula, &character.context(&vars));
        character
            .res
            .entry(def.id.clone())
            .or_insert_with(|| ResourceValue::full(max))
            .set_max(max);
    }

    refresh_inventory(character, pack, evaluator, &vars);
    character.derived = compute_derived(character, pack, evaluator, &vars);
    character.touch();

    debug!(
        pack = %pack.id(),
        derived = character.derived.len(),
        "recomputed character"
    );
}

/// `max(0, floor(formula))`
pub(super) fn resource_max(evaluator: &Evaluator, formula: &str, ctx: &EvalContext<'_>) -> f64 {
    evaluator.evaluate(formula, ctx).floor().max(0.0)
}

/// Copy the pack's inventory model onto the character and re-evaluate the weight limit
pub(super) fn refresh_inventory(character: &mut Character, pack: &Pack, evaluator: &Evaluator, vars: &Vars) {
    let schema = pack.inventory_schema();
    let formula = schema
        .and_then(|s| s.weight_limit_formula.as_deref())
        .unwrap_or("0");
    let weight_limit = evaluator
        .evaluate(formula, &character.context(vars))
        .floor()
        .max(0.0);

    let inventory = &mut character.inventory;
    inventory.mode = schema.map(|s| s.mode).unwrap_or_default();
    inventory.max_slots = schema.and_then(|s| s.max_slots);
    inventory.weight_limit = weight_limit;
    inventory.refresh_weight();
}

/// Evaluate every derived formula in declared order into a fresh map
///
/// Each value is visible to the formulas after it; values from a previous
/// pass are not.
pub(super) fn compute_derived(
    character: &Character,
    pack: &Pack,
    evaluator: &Evaluator,
    vars: &Vars,
) -> BTreeMap<String, f64> {
    let mut derived = BTreeMap::new();
    for def in &pack.schema.derived {
        let ctx = EvalContext {
            level: character.level,
            attr: &character.attr,
            res: &character.res,
            prof: &character.prof,
            derived: &derived,
            vars,
        };
        let value = evaluator.evaluate(&def.formula, &ctx);
        derived.insert(def.id.clone(), value);
    }
    derived
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equipment::FlatSource;
    use crate::pack::{DerivedDef, ResourceDef};

    fn pack() -> Pack {
        let mut pack = Pack::default();
        pack.metadata.id = "test".to_string();
        pack.schema.resources.push(ResourceDef {
            id: "hp".to_string(),
            label: None,
            default_max_formula: "10 + mod(attr.con) * level".to_string(),
        });
        pack.schema.derived = vec![
            DerivedDef {
                id: "first".to_string(),
                label: None,
                formula: "attr.con + 1".to_string(),
            },
            DerivedDef {
                id: "second".to_string(),
                label: None,
                formula: "derived.first * 2".to_string(),
            },
            DerivedDef {
                id: "ac".to_string(),
                label: None,
                formula: "10 + bonus('ac')".to_string(),
            },
        ];
        pack
    }

    fn character() -> Character {
        let mut c = Character::blank("test");
        c.attr.insert("con".to_string(), 14.0);
        c.level = 2;
        c
    }

    #[test]
    fn test_resources_created_full_then_clamped() {
        let pack = pack();
        let evaluator = Evaluator::new();
        let mut c = character();

        recompute(&mut c, &pack, &evaluator, None);
        assert_eq!(c.res["hp"], ResourceValue { current: 14.0, max: 14.0 });

        c.attr.insert("con".to_string(), 8.0);
        recompute(&mut c, &pack, &evaluator, None);
        assert_eq!(c.res["hp"], ResourceValue { current: 8.0, max: 8.0 });

        c.attr.insert("con".to_string(), 14.0);
        recompute(&mut c, &pack, &evaluator, None);
        assert_eq!(c.res["hp"], ResourceValue { current: 8.0, max: 14.0 });
    }

    #[test]
    fn test_derived_in_declared_order_and_replaced() {
        let pack = pack();
        let evaluator = Evaluator::new();
        let mut c = character();
        c.derived.insert("stale".to_string(), 99.0);

        recompute(&mut c, &pack, &evaluator, None);
        assert_eq!(c.derived.get("first"), Some(&15.0));
        assert_eq!(c.derived.get("second"), Some(&30.0));
        assert!(!c.derived.contains_key("stale"));
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let pack = pack();
        let evaluator = Evaluator::new();
        let mut c = character();

        recompute(&mut c, &pack, &evaluator, None);
        let once = (c.res.clone(), c.derived.clone(), c.inventory.clone());
        recompute(&mut c, &pack, &evaluator, None);
        assert_eq!((c.res.clone(), c.derived.clone(), c.inventory.clone()), once);
    }

    #[test]
    fn test_transient_vars_and_extra_sources() {
        let pack = pack();
        let evaluator = Evaluator::new();
        let mut c = character();

        let mut bonuses = BTreeMap::new();
        bonuses.insert("ac".to_string(), 2.0);
        let transient = Vars::new().with(crate::expr::BONUSES_VAR, bonuses);
        recompute(&mut c, &pack, &evaluator, Some(&transient));
        assert_eq!(c.derived.get("ac"), Some(&12.0));

        let spell = FlatSource::new("shield_of_faith").with_bonus("ac", 2.0);
        recompute_with_sources(&mut c, &pack, &evaluator, &[&spell], None);
        assert_eq!(c.derived.get("ac"), Some(&12.0));

        recompute(&mut c, &pack, &evaluator, None);
        assert_eq!(c.derived.get("ac"), Some(&10.0));
    }

    #[test]
    fn test_inventory_without_schema() {
        let pack = pack();
        let mut c = character();
        recompute(&mut c, &pack, &Evaluator::new(), None);
        assert_eq!(c.inventory.weight_limit, 0.0);
        assert_eq!(c.inventory.max_slots, None);
    }
}
