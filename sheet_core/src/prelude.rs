//! Prelude module for convenient imports
//!
//! ```rust
//! use sheet_core::prelude::*;
//! ```

// Packs
pub use crate::config::{load_pack, parse_pack_json, parse_pack_toml, PackError};
pub use crate::pack::{ModifierGroup, Pack, StackingPolicy};

// Characters
pub use crate::character::{recompute, Character, CharacterFactory, ResourceSeed, SeedOptions};
pub use crate::types::{InventoryItem, ResourceValue};

// Formulas
pub use crate::expr::{EvalContext, Evaluator, Vars};

// Equipment
pub use crate::equipment::{summarize, EquipmentSummary};

// Actions
pub use crate::actions::{Action, ActionOutcome};
