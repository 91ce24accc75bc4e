//! Dice notation parsing and rolling
//!
//! Supports formulas like "1d20+5", "2d6-1", "d8", "1d100" and sums of
//! several groups such as "2d6+1d4+3". The `roll()` formula builtin goes
//! through a [`DiceRoller`] so callers can swap in a seeded roller.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use thiserror::Error;

/// Upper bound on the total number of dice in one formula
pub const MAX_DICE: u32 = 1000;

/// Upper bound on die size
pub const MAX_SIDES: u32 = 10_000;

/// Largest flat modifier, in either direction
pub const MAX_MODIFIER: i64 = 1_000_000;

/// Error when parsing a dice formula
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Empty dice formula")]
    Empty,
    #[error("Invalid dice format: {0}")]
    InvalidFormat(String),
    #[error("Dice count must be at least 1")]
    InvalidDiceCount,
    #[error("Die size must be between 2 and {MAX_SIDES}")]
    InvalidDieSize,
    #[error("Formula rolls more than {MAX_DICE} dice")]
    TooManyDice,
    #[error("Modifier value overflow")]
    ModifierOverflow,
}

/// One `XdY` group, optionally subtracted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceGroup {
    pub count: u32,
    pub sides: u32,
    #[serde(default)]
    pub negative: bool,
}

/// A parsed dice formula like "2d6+3"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceFormula {
    pub groups: Vec<DiceGroup>,
    /// Flat modifier added after rolling
    pub modifier: i64,
}

impl DiceFormula {
    /// Parse a dice formula string
    ///
    /// Supported terms, joined by `+` or `-`:
    /// - "XdY" - roll X dice of size Y
    /// - "dY" - roll 1 die of size Y
    /// - "Z" - flat modifier
    ///
    /// At least one dice group is required.
    pub fn parse(input: &str) -> Result<Self, DiceError> {
        let input: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        if input.is_empty() {
            return Err(DiceError::Empty);
        }

        let mut groups = Vec::new();
        let mut modifier: i64 = 0;
        let mut total_dice: u32 = 0;

        for (negative, term) in split_terms(&input)? {
            if let Some(d_pos) = term.find('d') {
                let count_str = &term[..d_pos];
                let sides_str = &term[d_pos + 1..];

                let count: u32 = if count_str.is_empty() {
                    1
                } else {
                    count_str.parse().map_err(|_| {
                        DiceError::InvalidFormat(format!("Invalid dice count: '{}'", count_str))
                    })?
                };
                if count == 0 {
                    return Err(DiceError::InvalidDiceCount);
                }

                let sides: u32 = sides_str.parse().map_err(|_| {
                    DiceError::InvalidFormat(format!("Invalid die size: '{}'", sides_str))
                })?;
                if !(2..=MAX_SIDES).contains(&sides) {
                    return Err(DiceError::InvalidDieSize);
                }

                total_dice = total_dice.saturating_add(count);
                if total_dice > MAX_DICE {
                    return Err(DiceError::TooManyDice);
                }

                groups.push(DiceGroup {
                    count,
                    sides,
                    negative,
                });
            } else {
                if !term.chars().all(|c| c.is_ascii_digit()) {
                    return Err(DiceError::InvalidFormat(format!("Invalid modifier: '{}'", term)));
                }
                let value: i64 = term.parse().map_err(|_| DiceError::ModifierOverflow)?;
                let next = if negative {
                    modifier.checked_sub(value)
                } else {
                    modifier.checked_add(value)
                };
                modifier = next
                    .filter(|m| m.abs() <= MAX_MODIFIER)
                    .ok_or(DiceError::ModifierOverflow)?;
            }
        }

        if groups.is_empty() {
            return Err(DiceError::InvalidFormat(format!(
                "Missing 'd' separator in '{}'",
                input
            )));
        }

        Ok(DiceFormula { groups, modifier })
    }

    /// Roll with the given RNG
    pub fn roll_with(&self, rng: &mut impl Rng) -> DiceRollResult {
        let mut individual_rolls = Vec::new();
        let mut total = self.modifier;

        for group in &self.groups {
            for _ in 0..group.count {
                let roll = rng.gen_range(1..=group.sides as i64);
                individual_rolls.push(roll);
                total = if group.negative {
                    total.saturating_sub(roll)
                } else {
                    total.saturating_add(roll)
                };
            }
        }

        DiceRollResult {
            individual_rolls,
            modifier_applied: self.modifier,
            total,
        }
    }

    /// Minimum possible total
    pub fn min_roll(&self) -> i64 {
        self.groups.iter().fold(self.modifier, |acc, g| {
            let count = i64::from(g.count);
            if g.negative {
                acc.saturating_sub(count.saturating_mul(i64::from(g.sides)))
            } else {
                acc.saturating_add(count)
            }
        })
    }

    /// Maximum possible total
    pub fn max_roll(&self) -> i64 {
        self.groups.iter().fold(self.modifier, |acc, g| {
            let count = i64::from(g.count);
            if g.negative {
                acc.saturating_sub(count)
            } else {
                acc.saturating_add(count.saturating_mul(i64::from(g.sides)))
            }
        })
    }
}

fn split_terms(input: &str) -> Result<Vec<(bool, &str)>, DiceError> {
    let mut terms = Vec::new();
    let mut negative = false;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        if c == '+' || c == '-' {
            if i == start {
                // A sign is only allowed in front of the very first term
                if i != 0 {
                    return Err(DiceError::InvalidFormat(format!("Dangling operator in '{}'", input)));
                }
            } else {
                terms.push((negative, &input[start..i]));
            }
            negative = c == '-';
            start = i + 1;
        }
    }

    if start >= input.len() {
        return Err(DiceError::InvalidFormat(format!("Dangling operator in '{}'", input)));
    }
    terms.push((negative, &input[start..]));
    Ok(terms)
}

impl fmt::Display for DiceFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, group) in self.groups.iter().enumerate() {
            if group.negative {
                write!(f, "-")?;
            } else if i > 0 {
                write!(f, "+")?;
            }
            write!(f, "{}d{}", group.count, group.sides)?;
        }
        match self.modifier {
            0 => Ok(()),
            m if m > 0 => write!(f, "+{}", m),
            m => write!(f, "{}", m),
        }
    }
}

/// Result of rolling dice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRollResult {
    /// Individual die results, in formula order
    pub individual_rolls: Vec<i64>,
    pub modifier_applied: i64,
    pub total: i64,
}

/// Source of dice results for the `roll()` builtin
pub trait DiceRoller: Send + Sync {
    fn roll(&self, formula: &DiceFormula) -> DiceRollResult;
}

/// Rolls with the thread-local RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngRoller;

impl DiceRoller for ThreadRngRoller {
    fn roll(&self, formula: &DiceFormula) -> DiceRollResult {
        formula.roll_with(&mut rand::thread_rng())
    }
}

/// Deterministic roller for tests and replays
#[derive(Debug)]
pub struct SeededRoller {
    rng: Mutex<StdRng>,
}

impl SeededRoller {
    pub fn new(seed: u64) -> Self {
        SeededRoller {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl DiceRoller for SeededRoller {
    fn roll(&self, formula: &DiceFormula) -> DiceRollResult {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        formula.roll_with(&mut *rng)
    }
}

/// Parse and roll a notation string
pub fn roll_notation(roller: &dyn DiceRoller, notation: &str) -> Result<DiceRollResult, DiceError> {
    let formula = DiceFormula::parse(notation)?;
    Ok(roller.roll(&formula))
}
