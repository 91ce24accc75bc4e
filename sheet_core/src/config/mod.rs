//! Pack loading from TOML or JSON files
//!
//! Every loader parses, then [`normalize`]s, then [`validate`]s, so a pack
//! handed back to the caller is always ready for the engine.

mod normalize;
mod validate;

pub use normalize::normalize;
pub use validate::{collect_issues, validate, IssueCode, ValidationIssue};

use crate::pack::Pack;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Pack loading error
#[derive(Error, Debug)]
pub enum PackError {
    #[error("Failed to read pack file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported pack format '{0}' (expected .toml or .json)")]
    UnsupportedFormat(String),
    #[error("Invalid pack: {0}")]
    Invalid(#[from] ValidationIssue),
}

/// Load a pack file, choosing the format by extension
pub fn load_pack(path: &Path) -> Result<Pack, PackError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let content = match extension.as_str() {
        "toml" | "json" => fs::read_to_string(path)?,
        _ => return Err(PackError::UnsupportedFormat(path.display().to_string())),
    };
    if extension == "toml" {
        parse_pack_toml(&content)
    } else {
        parse_pack_json(&content)
    }
}

/// Parse a pack from a TOML string
pub fn parse_pack_toml(content: &str) -> Result<Pack, PackError> {
    let pack: Pack = toml::from_str(content)?;
    finish(pack)
}

/// Parse a pack from a JSON string
pub fn parse_pack_json(content: &str) -> Result<Pack, PackError> {
    let pack: Pack = serde_json::from_str(content)?;
    finish(pack)
}

fn finish(pack: Pack) -> Result<Pack, PackError> {
    let pack = normalize(pack);
    validate(&pack)?;
    for issue in collect_issues(&pack) {
        warn!(pack = %pack.id(), "{}", issue);
    }
    info!(
        pack = %pack.id(),
        attributes = pack.schema.attributes.len(),
        resources = pack.schema.resources.len(),
        derived = pack.schema.derived.len(),
        "loaded pack"
    );
    Ok(pack)
}
