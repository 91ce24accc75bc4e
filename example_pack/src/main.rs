//! Example Pack - builds a character from the bundled rule pack
//!
//! This example shows:
//! - Loading and validating a TOML pack
//! - Creating a character with seed options and a starting loadout
//! - Applying actions, both as function calls and as JSON data
//! - Reading the sheet back as JSON
//!
//! Run with `RUST_LOG=sheet_core=debug` to see swallowed formula failures
//! and no-op actions.

use sheet_core::actions::{self, Action};
use sheet_core::prelude::*;
use std::process::ExitCode;
use tracing::{error, info};

const BASIC_PACK: &str = include_str!("../../sheet_core/packs/basic.toml");

const SCRIPT: &str = r#"[
    {"type": "damage_resource", "id": "hp", "amount": 7},
    {"type": "add_item", "item": {"contentId": "ring_of_protection", "label": "Ring of Protection", "tags": ["protection"], "slot": "ring"}},
    {"type": "set_proficiency", "id": "perception", "rank": "trained"},
    {"type": "add_level", "delta": 4},
    {"type": "set_proficiency", "id": "perception", "rank": "legendary"},
    {"type": "long_rest"}
]"#;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pack = parse_pack_toml(BASIC_PACK)?;
    let evaluator = Evaluator::for_pack(&pack);

    let options = SeedOptions::new("Brienne")
        .with_attribute("str", 16.0)
        .with_attribute("dex", 14.0)
        .with_attribute("con", 15.0)
        .with_item(
            InventoryItem::new("plate-1", "plate_armor", "Plate Armor")
                .with_tag("armor_heavy")
                .with_slot("armor")
                .with_weight(65.0),
        )
        .with_item(
            InventoryItem::new("shield-1", "shield", "Shield")
                .with_tag("shield")
                .with_slot("off_hand")
                .with_weight(6.0),
        );
    let mut character = CharacterFactory::create(&pack, &evaluator, options)?;
    print_summary("created", &character);

    // Direct calls
    actions::unequip(&mut character, &pack, &evaluator, "plate-1");
    print_summary("took off plate", &character);
    actions::equip(&mut character, &pack, &evaluator, "plate-1", "armor", None);

    // Data-driven actions
    let script: Vec<Action> = serde_json::from_str(SCRIPT)?;
    for action in &script {
        if let Err(e) = action.validate(&pack) {
            info!(action = action.name(), "skipping invalid action: {}", e);
            continue;
        }
        let outcome = action.apply(&mut character, &pack, &evaluator);
        info!(action = action.name(), ?outcome, "applied");
    }
    print_summary("after script", &character);

    println!("{}", serde_json::to_string_pretty(&character)?);
    Ok(())
}

fn print_summary(label: &str, character: &Character) {
    let derived = |id: &str| character.derived_value(id).unwrap_or(0.0);
    let hp = character.resource("hp").copied().unwrap_or_default();
    println!(
        "[{}] {} L{}  hp {}/{}  ac {}  perception {}  speed {}  load {}/{}",
        label,
        character.name,
        character.level,
        hp.current,
        hp.max,
        derived("ac"),
        derived("perception"),
        derived("speed"),
        character.inventory.carried_weight,
        character.inventory.weight_limit,
    );
}
