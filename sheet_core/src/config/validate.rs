//! Structural pack validation
//!
//! Issues are reported as `code at path: message`, with paths written the way
//! the pack document spells them (`schema.attributes[2].id`).
//!
//! Broken formulas and rankless proficiency categories are reported but do not
//! reject a pack: the formula evaluates to `0` and the category falls back to
//! the untrained rank.

use crate::expr::parse;
use crate::pack::Pack;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    MissingId,
    DuplicateId,
    InvalidRange,
    EmptyRanks,
    InvalidFormula,
    InvalidSlot,
}

impl IssueCode {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueCode::MissingId => "missing_id",
            IssueCode::DuplicateId => "duplicate_id",
            IssueCode::InvalidRange => "invalid_range",
            IssueCode::EmptyRanks => "empty_ranks",
            IssueCode::InvalidFormula => "invalid_formula",
            IssueCode::InvalidSlot => "invalid_slot",
        }
    }

    /// Whether a pack with this issue is rejected at load
    pub fn is_fatal(self) -> bool {
        !matches!(self, IssueCode::EmptyRanks | IssueCode::InvalidFormula)
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structural problem in a pack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{code} at {path}: {message}")]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(code: IssueCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            code,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Fail on the first fatal issue
pub fn validate(pack: &Pack) -> Result<(), ValidationIssue> {
    match collect_issues(pack).into_iter().find(|issue| issue.code.is_fatal()) {
        Some(issue) => Err(issue),
        None => Ok(()),
    }
}

/// Every issue in document order
pub fn collect_issues(pack: &Pack) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if pack.metadata.id.trim().is_empty() {
        issues.push(ValidationIssue::new(
            IssueCode::MissingId,
            "metadata.id",
            "pack id is required",
        ));
    }

    let schema = &pack.schema;
    check_ids(
        &mut issues,
        "schema.attributes",
        schema.attributes.iter().map(|a| a.id.as_str()),
    );
    for (i, attr) in schema.attributes.iter().enumerate() {
        if let (Some(min), Some(max)) = (attr.min, attr.max) {
            if min > max {
                issues.push(ValidationIssue::new(
                    IssueCode::InvalidRange,
                    format!("schema.attributes[{}]", i),
                    format!("min {} is greater than max {}", min, max),
                ));
            }
        }
    }

    check_ids(
        &mut issues,
        "schema.resources",
        schema.resources.iter().map(|r| r.id.as_str()),
    );
    for (i, resource) in schema.resources.iter().enumerate() {
        check_formula(
            &mut issues,
            format!("schema.resources[{}].defaultMaxFormula", i),
            &resource.default_max_formula,
        );
    }

    check_ids(
        &mut issues,
        "schema.proficiencyCategories",
        schema.proficiency_categories.iter().map(|p| p.id.as_str()),
    );
    for (i, category) in schema.proficiency_categories.iter().enumerate() {
        if category.ranks.is_empty() {
            issues.push(ValidationIssue::new(
                IssueCode::EmptyRanks,
                format!("schema.proficiencyCategories[{}].ranks", i),
                "at least one rank is required",
            ));
        }
    }

    let inventory_path = if schema.inventory.is_some() {
        "schema.inventory"
    } else {
        "mechanics.inventory"
    };
    if let Some(inventory) = pack.inventory_schema() {
        if let Some(formula) = &inventory.weight_limit_formula {
            check_formula(
                &mut issues,
                format!("{}.weightLimitFormula", inventory_path),
                formula,
            );
        }
        let slots_path = format!("{}.slotTypes", inventory_path);
        check_ids(
            &mut issues,
            &slots_path,
            inventory.slot_types.iter().map(|s| s.id.as_str()),
        );
        for (i, slot) in inventory.slot_types.iter().enumerate() {
            if slot.max_equipped == 0 {
                issues.push(ValidationIssue::new(
                    IssueCode::InvalidSlot,
                    format!("{}[{}].maxEquipped", slots_path, i),
                    "a slot must hold at least one item",
                ));
            }
        }
    }

    check_ids(
        &mut issues,
        "schema.derived",
        schema.derived.iter().map(|d| d.id.as_str()),
    );
    for (i, derived) in schema.derived.iter().enumerate() {
        check_formula(&mut issues, format!("schema.derived[{}].formula", i), &derived.formula);
    }

    issues
}

fn check_ids<'a>(issues: &mut Vec<ValidationIssue>, path: &str, ids: impl Iterator<Item = &'a str>) {
    let mut seen = HashSet::new();
    for (i, id) in ids.enumerate() {
        let id_path = format!("{}[{}].id", path, i);
        if id.trim().is_empty() {
            issues.push(ValidationIssue::new(IssueCode::MissingId, id_path, "id is required"));
        } else if !seen.insert(id) {
            issues.push(ValidationIssue::new(
                IssueCode::DuplicateId,
                id_path,
                format!("'{}' is declared more than once", id),
            ));
        }
    }
}

fn check_formula(issues: &mut Vec<ValidationIssue>, path: String, formula: &str) {
    if let Err(err) = parse(formula) {
        issues.push(ValidationIssue::new(IssueCode::InvalidFormula, path, err.to_string()));
    }
}
