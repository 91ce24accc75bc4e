//! sheet_core - Rule-pack driven character engine
//!
//! This library provides:
//! - Pack: a declarative game-system description, loaded from TOML or JSON
//! - Evaluator: compiles, caches and evaluates pack formulas
//! - Equipment aggregation: caps and bonuses from equipped items under stacking rules
//! - Character: built by the factory, kept consistent by recompute
//! - Actions: named mutations, each ending in a recompute

pub mod actions;
pub mod character;
pub mod config;
pub mod dice;
pub mod equipment;
pub mod expr;
pub mod lookup;
pub mod pack;
pub mod prelude;
pub mod types;

// Re-export core types for convenience
pub use actions::{Action, ActionError, ActionOutcome};
pub use character::{recompute, Character, CharacterError, CharacterFactory, ResourceSeed, SeedOptions};
pub use config::{
    collect_issues, load_pack, normalize, parse_pack_json, parse_pack_toml, validate, IssueCode,
    PackError, ValidationIssue,
};
pub use dice::{DiceError, DiceFormula, DiceRollResult, DiceRoller, SeededRoller, ThreadRngRoller};
pub use equipment::{summarize, EquipmentSummary, ModifierSource};
pub use expr::{EvalContext, EvalError, Evaluator, ParseError, VarValue, Vars};
pub use lookup::{lookup, LookupTable, LookupTables};
pub use pack::{ModifierGroup, Pack, StackingPolicy};
pub use types::{InventoryItem, InventoryState, ResourceValue, SlotState};
