//! Tree-walking interpreter for compiled formulas
//!
//! Every builtin receives the [`Scope`] of the evaluation that invoked it, so
//! `cap()` and `bonus()` read the vars of *this* call only. Nothing about an
//! evaluation outlives it.

use super::context::{EvalContext, VarRef, VarValue, Vars};
use super::error::EvalError;
use super::parser::{BinaryOp, Builtin, Expr, UnaryOp};
use crate::dice::{roll_notation, DiceRoller};
use crate::lookup::{lookup, LookupTables};
use crate::types::ResourceValue;
use std::collections::BTreeMap;

/// A runtime value; tables borrow straight from the context
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value<'c> {
    Number(f64),
    Text(String),
    Bool(bool),
    Undefined,
    Table(TableRef<'c>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TableRef<'c> {
    Attr(&'c BTreeMap<String, f64>),
    Res(&'c BTreeMap<String, ResourceValue>),
    Resource(&'c ResourceValue),
    Prof(&'c BTreeMap<String, String>),
    Derived(&'c BTreeMap<String, f64>),
    Vars(&'c Vars),
    VarTable(&'c BTreeMap<String, VarValue>),
}

impl<'c> Value<'c> {
    /// Numeric coercion: text parses, booleans are 0/1, everything else is NaN
    pub(crate) fn to_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Undefined | Value::Table(_) => f64::NAN,
        }
    }

    /// Only real, non-NaN numbers; anything else becomes 0
    fn number_or_zero(&self) -> f64 {
        match self {
            Value::Number(n) if !n.is_nan() => *n,
            _ => 0.0,
        }
    }

    fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(text) => !text.is_empty(),
            Value::Bool(b) => *b,
            Value::Undefined => false,
            Value::Table(_) => true,
        }
    }

    /// String form used for keys and concatenation
    pub(crate) fn to_text(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::Text(text) => text.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Undefined => "undefined".to_string(),
            Value::Table(_) => "[object Object]".to_string(),
        }
    }

    fn from_var(value: &'c VarValue) -> Value<'c> {
        match value {
            VarValue::Number(n) => Value::Number(*n),
            VarValue::Flag(b) => Value::Bool(*b),
            VarValue::Text(text) => Value::Text(text.clone()),
            VarValue::Table(entries) => Value::Table(TableRef::VarTable(entries)),
        }
    }
}

/// Render a number the way formula authors expect: `7`, not `7.0`
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        "0".to_string()
    } else if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        format!("{}", n)
    }
}

/// Everything one evaluation may touch
pub(crate) struct Scope<'c> {
    pub ctx: EvalContext<'c>,
    pub lookups: &'c LookupTables,
    pub dice: &'c dyn DiceRoller,
}

impl<'c> Scope<'c> {
    pub(crate) fn eval(&self, expr: &Expr) -> Result<Value<'c>, EvalError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Text(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Ident(name) => self.resolve_root(name),
            Expr::Member(target, name) => {
                let target = self.eval(target)?;
                member(&target, name)
            }
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let key = self.eval(index)?.to_text();
                member(&target, &key)
            }
            Expr::Call(builtin, args) => self.call(*builtin, args),
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                })
            }
            Expr::Binary(BinaryOp::And, left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    self.eval(right)
                } else {
                    Ok(left)
                }
            }
            Expr::Binary(BinaryOp::Or, left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, &left, &right)
            }
            Expr::Conditional(condition, then, otherwise) => {
                if self.eval(condition)?.is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
        }
    }

    fn resolve_root(&self, name: &str) -> Result<Value<'c>, EvalError> {
        let ctx = self.ctx;
        Ok(match name {
            "level" => Value::Number(ctx.level as f64),
            "attr" => Value::Table(TableRef::Attr(ctx.attr)),
            "res" => Value::Table(TableRef::Res(ctx.res)),
            "prof" => Value::Table(TableRef::Prof(ctx.prof)),
            "derived" => Value::Table(TableRef::Derived(ctx.derived)),
            "vars" => Value::Table(TableRef::Vars(ctx.vars)),
            "Infinity" => Value::Number(f64::INFINITY),
            // Bare names fall back to derived values, then top-level vars
            _ => {
                if let Some(value) = ctx.derived.get(name) {
                    Value::Number(*value)
                } else {
                    match ctx.vars.scoped(name) {
                        Some(VarRef::Value(value)) => Value::from_var(value),
                        Some(VarRef::BaseHpDefault) => Value::Number(0.0),
                        None => return Err(EvalError::UnknownIdentifier(name.to_string())),
                    }
                }
            }
        })
    }

    fn call(&self, builtin: Builtin, args: &[Expr]) -> Result<Value<'c>, EvalError> {
        let values = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let number = |i: usize| values.get(i).map(Value::to_number).unwrap_or(f64::NAN);
        let text = |i: usize| values.get(i).map(Value::to_text).unwrap_or_default();
        let loose_number = |i: usize| values.get(i).map_or(0.0, Value::number_or_zero);

        let result = match builtin {
            Builtin::Floor => number(0).floor(),
            Builtin::Ceil => number(0).ceil(),
            // Half-up rounding: round(-2.5) == -2
            Builtin::Round => (number(0) + 0.5).floor(),
            Builtin::Min => fold_numbers(&values, f64::INFINITY, f64::min),
            Builtin::Max => fold_numbers(&values, f64::NEG_INFINITY, f64::max),
            Builtin::Clamp => {
                let (x, lo, hi) = (number(0), number(1), number(2));
                if x.is_nan() || lo.is_nan() || hi.is_nan() {
                    f64::NAN
                } else {
                    lo.max(hi.min(x))
                }
            }
            Builtin::Mod => match values.first() {
                Some(Value::Number(score)) if !score.is_nan() => ((score - 10.0) / 2.0).floor(),
                _ => 0.0,
            },
            Builtin::Lookup => lookup(self.lookups, &text(0), &text(1)),
            Builtin::Roll => roll_notation(self.dice, &text(0))
                .map(|r| r.total as f64)
                .unwrap_or(0.0),
            Builtin::TakeHigherOf => loose_number(0).max(loose_number(1)),
            Builtin::TakeLowerOf => loose_number(0).min(loose_number(1)),
            Builtin::Cap => {
                let value = number(0);
                if value.is_nan() {
                    f64::NAN
                } else {
                    value.min(self.ctx.vars.cap_value(&text(1)))
                }
            }
            Builtin::CapValue => self.ctx.vars.cap_value(&text(0)),
            Builtin::Bonus => self.ctx.vars.bonus(&text(0)),
        };
        Ok(Value::Number(result))
    }
}

fn fold_numbers(values: &[Value<'_>], init: f64, pick: fn(f64, f64) -> f64) -> f64 {
    let mut acc = init;
    for value in values {
        let n = value.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        acc = pick(acc, n);
    }
    acc
}

fn member<'c>(target: &Value<'c>, key: &str) -> Result<Value<'c>, EvalError> {
    let table = match target {
        Value::Table(table) => *table,
        Value::Undefined => return Err(EvalError::UndefinedAccess(key.to_string())),
        _ => return Ok(Value::Undefined),
    };
    Ok(match table {
        TableRef::Attr(map) | TableRef::Derived(map) => {
            map.get(key).map_or(Value::Undefined, |n| Value::Number(*n))
        }
        TableRef::Res(map) => map
            .get(key)
            .map_or(Value::Undefined, |r| Value::Table(TableRef::Resource(r))),
        TableRef::Resource(resource) => match key {
            "current" => Value::Number(resource.current),
            "max" => Value::Number(resource.max),
            _ => Value::Undefined,
        },
        TableRef::Prof(map) => map
            .get(key)
            .map_or(Value::Undefined, |rank| Value::Text(rank.clone())),
        TableRef::Vars(vars) => match vars.scoped(key) {
            Some(VarRef::Value(value)) => Value::from_var(value),
            Some(VarRef::BaseHpDefault) => Value::Number(0.0),
            None => Value::Undefined,
        },
        TableRef::VarTable(entries) => entries.get(key).map_or(Value::Undefined, Value::from_var),
    })
}

fn binary<'c>(op: BinaryOp, left: &Value<'c>, right: &Value<'c>) -> Result<Value<'c>, EvalError> {
    let numbers = || (left.to_number(), right.to_number());
    let value = match op {
        BinaryOp::Add => {
            if matches!(left, Value::Text(_)) || matches!(right, Value::Text(_)) {
                Value::Text(format!("{}{}", left.to_text(), right.to_text()))
            } else {
                let (a, b) = numbers();
                Value::Number(a + b)
            }
        }
        BinaryOp::Sub => {
            let (a, b) = numbers();
            Value::Number(a - b)
        }
        BinaryOp::Mul => {
            let (a, b) = numbers();
            Value::Number(a * b)
        }
        BinaryOp::Div | BinaryOp::Rem => {
            let (a, b) = numbers();
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Value::Number(if op == BinaryOp::Div { a / b } else { a % b })
        }
        BinaryOp::Pow => {
            let (a, b) = numbers();
            Value::Number(a.powf(b))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (left, right) {
                (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
                _ => {
                    let (a, b) = numbers();
                    a.partial_cmp(&b)
                }
            };
            Value::Bool(ordering.is_some_and(|o| match op {
                BinaryOp::Lt => o.is_lt(),
                BinaryOp::Le => o.is_le(),
                BinaryOp::Gt => o.is_gt(),
                _ => o.is_ge(),
            }))
        }
        BinaryOp::Eq => Value::Bool(loose_eq(left, right)),
        BinaryOp::Ne => Value::Bool(!loose_eq(left, right)),
        // Only reached when called directly; eval short-circuits these
        BinaryOp::And => {
            if left.is_truthy() {
                right.clone()
            } else {
                left.clone()
            }
        }
        BinaryOp::Or => {
            if left.is_truthy() {
                left.clone()
            } else {
                right.clone()
            }
        }
    };
    Ok(value)
}

fn loose_eq(left: &Value<'_>, right: &Value<'_>) -> bool {
    match (left, right) {
        (Value::Text(a), Value::Text(b)) => a == b,
        (Value::Undefined, Value::Undefined) => true,
        (Value::Undefined, _) | (_, Value::Undefined) => false,
        (Value::Table(_), _) | (_, Value::Table(_)) => false,
        _ => left.to_number() == right.to_number(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(7.0), "7");
        assert_eq!(format_number(7.5), "7.5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
    }

    #[test]
    fn test_coercions() {
        assert_eq!(Value::Text(" 12 ".to_string()).to_number(), 12.0);
        assert_eq!(Value::Text(String::new()).to_number(), 0.0);
        assert!(Value::Text("abc".to_string()).to_number().is_nan());
        assert_eq!(Value::Bool(true).to_number(), 1.0);
        assert!(Value::Undefined.to_number().is_nan());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(Value::Text("x".to_string()).is_truthy());
    }

    #[test]
    fn test_string_concatenation_and_comparison() {
        let a = Value::Text("tier".to_string());
        let b = Value::Number(2.0);
        assert_eq!(binary(BinaryOp::Add, &a, &b), Ok(Value::Text("tier2".to_string())));
        assert_eq!(
            binary(BinaryOp::Eq, &Value::Text("2".to_string()), &b),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            binary(BinaryOp::Lt, &Value::Text("a".to_string()), &Value::Text("b".to_string())),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            binary(BinaryOp::Div, &b, &Value::Number(0.0)),
            Err(EvalError::DivisionByZero)
        );
    }
}
