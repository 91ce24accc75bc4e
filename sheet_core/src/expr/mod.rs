//! Formula evaluator - compiles, caches and evaluates pack formulas
//!
//! Formulas are compiled once per distinct (trimmed) text and kept in an LRU
//! cache. Evaluation is fail-soft: [`Evaluator::evaluate`] turns any failure
//! or non-finite result into `0`, while [`Evaluator::try_evaluate`] reports
//! why.

mod cache;
mod context;
mod error;
mod interpreter;
mod lexer;
mod parser;

pub use cache::{ExpressionCache, DEFAULT_CACHE_CAPACITY};
pub use context::{EvalContext, VarRef, VarValue, Vars, BASE_HP_VAR, BONUSES_VAR, CAPS_VAR};
pub use error::{EvalError, ParseError};
pub use interpreter::format_number;
pub use parser::{parse, BinaryOp, Builtin, Expr, UnaryOp, MAX_DEPTH};

use crate::dice::{DiceRoller, ThreadRngRoller};
use crate::lookup::LookupTables;
use crate::pack::Pack;
use interpreter::{Scope, Value};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Formula evaluator bound to a pack's lookup tables and a dice roller
pub struct Evaluator {
    cache: Mutex<ExpressionCache>,
    lookups: LookupTables,
    dice: Box<dyn DiceRoller>,
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("cached", &self.cache_len())
            .field("lookups", &self.lookups.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// Evaluator with no lookup tables and the thread RNG for `roll()`
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Evaluator {
            cache: Mutex::new(ExpressionCache::with_capacity(capacity)),
            lookups: LookupTables::new(),
            dice: Box::new(ThreadRngRoller),
        }
    }

    /// Evaluator wired to `pack.rules.lookups`
    pub fn for_pack(pack: &Pack) -> Self {
        Self::new().with_lookups(pack.rules.lookups.clone())
    }

    pub fn with_lookups(mut self, lookups: LookupTables) -> Self {
        self.lookups = lookups;
        self
    }

    pub fn with_dice_roller(mut self, roller: impl DiceRoller + 'static) -> Self {
        self.dice = Box::new(roller);
        self
    }

    pub fn lookups(&self) -> &LookupTables {
        &self.lookups
    }

    fn cache(&self) -> MutexGuard<'_, ExpressionCache> {
        // A panic mid-insert leaves the cache consistent enough to keep using
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Compile a formula, reusing the cached tree when there is one
    ///
    /// Only successful compilations are cached.
    pub fn compile(&self, expression: &str) -> Result<Arc<Expr>, ParseError> {
        let key = expression.trim();
        if let Some(expr) = self.cache().get(key) {
            return Ok(expr);
        }
        let expr = Arc::new(parse(key)?);
        self.cache().insert(key.to_string(), Arc::clone(&expr));
        Ok(expr)
    }

    pub fn cache_len(&self) -> usize {
        self.cache().len()
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    /// Evaluate a formula, reporting why it failed
    ///
    /// Booleans count as 1/0. Text, undefined values and non-finite numbers
    /// are failures.
    pub fn try_evaluate(&self, expression: &str, ctx: &EvalContext<'_>) -> Result<f64, EvalError> {
        let expr = self.compile(expression)?;
        self.run(&expr, ctx)
    }

    /// Evaluate an already compiled formula
    pub fn evaluate_compiled(&self, expr: &Expr, ctx: &EvalContext<'_>) -> Result<f64, EvalError> {
        self.run(expr, ctx)
    }

    fn run(&self, expr: &Expr, ctx: &EvalContext<'_>) -> Result<f64, EvalError> {
        let scope = Scope {
            ctx: *ctx,
            lookups: &self.lookups,
            dice: self.dice.as_ref(),
        };
        match scope.eval(expr)? {
            Value::Number(n) if n.is_finite() => Ok(n),
            Value::Number(n) if n.is_nan() => Err(EvalError::NotANumber),
            Value::Number(n) => Err(EvalError::NonFinite(n)),
            Value::Bool(b) => Ok(if b { 1.0 } else { 0.0 }),
            Value::Text(_) | Value::Undefined | Value::Table(_) => Err(EvalError::NotANumber),
        }
    }

    /// Evaluate a formula; any failure yields `0`
    pub fn evaluate(&self, expression: &str, ctx: &EvalContext<'_>) -> f64 {
        match self.try_evaluate(expression, ctx) {
            Ok(value) => value,
            Err(error) => {
                debug!(expression, %error, "formula evaluated to 0");
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::SeededRoller;
    use crate::lookup::LookupTable;
    use crate::types::ResourceValue;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    struct Sheet {
        level: u32,
        attr: BTreeMap<String, f64>,
        res: BTreeMap<String, ResourceValue>,
        prof: BTreeMap<String, String>,
        derived: BTreeMap<String, f64>,
    }

    impl Sheet {
        fn new() -> Self {
            let mut attr = BTreeMap::new();
            attr.insert("str".to_string(), 16.0);
            attr.insert("dex".to_string(), 14.0);
            let mut res = BTreeMap::new();
            res.insert("hp".to_string(), ResourceValue { current: 7.0, max: 12.0 });
            let mut prof = BTreeMap::new();
            prof.insert("armor".to_string(), "trained".to_string());
            let mut derived = BTreeMap::new();
            derived.insert("ac".to_string(), 12.0);
            Sheet {
                level: 5,
                attr,
                res,
                prof,
                derived,
            }
        }

        fn ctx<'a>(&'a self, vars: &'a Vars) -> EvalContext<'a> {
            EvalContext {
                level: self.level,
                attr: &self.attr,
                res: &self.res,
                prof: &self.prof,
                derived: &self.derived,
                vars,
            }
        }
    }

    fn eval(expression: &str) -> f64 {
        let sheet = Sheet::new();
        let vars = Vars::new();
        Evaluator::new().evaluate(expression, &sheet.ctx(&vars))
    }

    #[test]
    fn test_ability_modifier() {
        assert_eq!(eval("mod(10)"), 0.0);
        assert_eq!(eval("mod(16)"), 3.0);
        assert_eq!(eval("mod(7)"), -2.0);
        assert_eq!(eval("mod(attr.dex)"), 2.0);
        assert_eq!(eval("mod('16')"), 0.0);
    }

    #[test]
    fn test_scope_roots() {
        assert_eq!(eval("level"), 5.0);
        assert_eq!(eval("attr.str * 15"), 240.0);
        assert_eq!(eval("attr['str']"), 16.0);
        assert_eq!(eval("res.hp.current + res.hp.max"), 19.0);
        assert_eq!(eval("derived.ac"), 12.0);
        assert_eq!(eval("prof.armor == 'trained' ? 2 : 0"), 2.0);
        assert_eq!(eval("vars.base_hp"), 0.0);
    }

    #[test]
    fn test_bare_names_read_derived_then_vars() {
        let sheet = Sheet::new();
        let vars = Vars::new().with("rage", 2.0).with("ac", 99.0);
        let evaluator = Evaluator::new();
        let ctx = sheet.ctx(&vars);
        assert_eq!(evaluator.evaluate("ac + 1", &ctx), 13.0);
        assert_eq!(evaluator.evaluate("rage * 2", &ctx), 4.0);
        assert_eq!(evaluator.evaluate("base_hp", &ctx), 0.0);
    }

    #[test]
    fn test_builtins() {
        assert_eq!(eval("floor(2.7) + ceil(2.1)"), 5.0);
        assert_eq!(eval("round(2.5)"), 3.0);
        assert_eq!(eval("round(-2.5)"), -2.0);
        assert_eq!(eval("min(4, 2, 9)"), 2.0);
        assert_eq!(eval("max(4, 2, 9)"), 9.0);
        assert_eq!(eval("clamp(15, 0, 10)"), 10.0);
        assert_eq!(eval("clamp(-3, 0, 10)"), 0.0);
        assert_eq!(eval("take_higher_of(3, 'x')"), 3.0);
        assert_eq!(eval("take_lower_of(-3, attr.missing)"), -3.0);
        assert_eq!(eval("2 ^ 3 ^ 2"), 512.0);
    }

    #[test]
    fn test_failures_yield_zero() {
        assert_eq!(eval(""), 0.0);
        assert_eq!(eval("1 +"), 0.0);
        assert_eq!(eval("frobnicate(2)"), 0.0);
        assert_eq!(eval("unknown_root + 1"), 0.0);
        assert_eq!(eval("attr.missing"), 0.0);
        assert_eq!(eval("attr.missing.deeper"), 0.0);
        assert_eq!(eval("1 / 0"), 0.0);
        assert_eq!(eval("'text'"), 0.0);
        assert_eq!(eval("Infinity"), 0.0);
    }

    #[test]
    fn test_try_evaluate_reports_reason() {
        let sheet = Sheet::new();
        let vars = Vars::new();
        let ctx = sheet.ctx(&vars);
        let evaluator = Evaluator::new();

        assert!(matches!(
            evaluator.try_evaluate("frobnicate(2)", &ctx),
            Err(EvalError::Parse(ParseError::UnknownFunction(_)))
        ));
        assert_eq!(
            evaluator.try_evaluate("nobody", &ctx),
            Err(EvalError::UnknownIdentifier("nobody".to_string()))
        );
        assert_eq!(evaluator.try_evaluate("1 % 0", &ctx), Err(EvalError::DivisionByZero));
        assert_eq!(
            evaluator.try_evaluate("Infinity", &ctx),
            Err(EvalError::NonFinite(f64::INFINITY))
        );
        assert_eq!(evaluator.try_evaluate("3 > 2", &ctx), Ok(1.0));
    }

    #[test]
    fn test_lookup_with_numeric_fallback() {
        let mut tables = LookupTables::new();
        tables.insert(
            "prof_bonus".to_string(),
            LookupTable::new().with("1", 2.0).with("5", 3.0).with("9", 4.0),
        );
        let evaluator = Evaluator::new().with_lookups(tables);
        let sheet = Sheet::new();
        let vars = Vars::new();
        let ctx = sheet.ctx(&vars);

        assert_eq!(evaluator.evaluate("lookup('prof_bonus', 1)", &ctx), 2.0);
        assert_eq!(evaluator.evaluate("lookup('prof_bonus', 7)", &ctx), 3.0);
        assert_eq!(evaluator.evaluate("lookup('prof_bonus', 9)", &ctx), 4.0);
        assert_eq!(evaluator.evaluate("lookup('prof_bonus', 0)", &ctx), 0.0);
        assert_eq!(evaluator.evaluate("lookup('prof_bonus', level)", &ctx), 3.0);
        assert_eq!(evaluator.evaluate("lookup('missing', 1)", &ctx), 0.0);
    }

    #[test]
    fn test_cap_and_bonus() {
        let sheet = Sheet::new();
        let evaluator = Evaluator::new();

        let empty = Vars::new();
        assert_eq!(evaluator.evaluate("cap(5, 'k')", &sheet.ctx(&empty)), 5.0);
        assert_eq!(evaluator.evaluate("bonus('k')", &sheet.ctx(&empty)), 0.0);

        let mut caps = BTreeMap::new();
        caps.insert("k".to_string(), 2.0);
        let mut bonuses = BTreeMap::new();
        bonuses.insert("k".to_string(), 1.0);
        let vars = Vars::new().with(CAPS_VAR, caps).with(BONUSES_VAR, bonuses);
        assert_eq!(evaluator.evaluate("cap(5, 'k')", &sheet.ctx(&vars)), 2.0);
        assert_eq!(evaluator.evaluate("cap_value('k')", &sheet.ctx(&vars)), 2.0);
        assert_eq!(evaluator.evaluate("bonus('k')", &sheet.ctx(&vars)), 1.0);
    }

    #[test]
    fn test_vars_do_not_leak_between_evaluations() {
        let sheet = Sheet::new();
        let evaluator = Evaluator::new();
        let mut caps = BTreeMap::new();
        caps.insert("k".to_string(), 2.0);
        let capped = Vars::new().with(CAPS_VAR, caps);
        let open = Vars::new();

        assert_eq!(evaluator.evaluate("cap(5, 'k')", &sheet.ctx(&capped)), 2.0);
        assert_eq!(evaluator.evaluate("cap(5, 'k')", &sheet.ctx(&open)), 5.0);
        assert_eq!(evaluator.evaluate("cap(5, 'k')", &sheet.ctx(&capped)), 2.0);
    }

    #[test]
    fn test_shared_evaluator_across_threads() {
        let evaluator = Evaluator::new();
        std::thread::scope(|s| {
            for cap in 1..=4 {
                let evaluator = &evaluator;
                s.spawn(move || {
                    let sheet = Sheet::new();
                    let mut caps = BTreeMap::new();
                    caps.insert("k".to_string(), cap as f64);
                    let vars = Vars::new().with(CAPS_VAR, caps);
                    for _ in 0..100 {
                        assert_eq!(
                            evaluator.evaluate("cap(10, 'k')", &sheet.ctx(&vars)),
                            cap as f64
                        );
                    }
                });
            }
        });
    }

    #[test]
    fn test_roll_uses_configured_roller() {
        let sheet = Sheet::new();
        let vars = Vars::new();
        let ctx = sheet.ctx(&vars);

        let a = Evaluator::new().with_dice_roller(SeededRoller::new(7));
        let b = Evaluator::new().with_dice_roller(SeededRoller::new(7));
        for _ in 0..10 {
            let total = a.evaluate("roll('2d6+1')", &ctx);
            assert!((3.0..=13.0).contains(&total));
            assert_eq!(total, b.evaluate("roll('2d6+1')", &ctx));
        }
        assert_eq!(a.evaluate("roll('nonsense')", &ctx), 0.0);
    }

    #[test]
    fn test_oversized_roll_modifier_yields_zero() {
        assert_eq!(eval("roll('1d6+9223372036854775807')"), 0.0);
        assert_eq!(eval("roll('1d6-9223372036854775807-9')"), 0.0);
        assert_eq!(eval("roll('1d1+5')"), 0.0);
    }

    #[test]
    fn test_runaway_chains_yield_zero() {
        let sheet = Sheet::new();
        let vars = Vars::new();
        let ctx = sheet.ctx(&vars);
        let evaluator = Evaluator::new();

        let sum = vec!["1"; 10_000].join(" + ");
        assert_eq!(evaluator.evaluate(&sum, &ctx), 0.0);
        assert_eq!(
            evaluator.try_evaluate(&sum, &ctx),
            Err(EvalError::Parse(ParseError::TooDeep(MAX_DEPTH)))
        );

        let members = format!("attr{}", ".str".repeat(10_000));
        assert_eq!(evaluator.evaluate(&members, &ctx), 0.0);

        let short = vec!["1"; 50].join(" + ");
        assert_eq!(evaluator.evaluate(&short, &ctx), 50.0);
    }

    #[test]
    fn test_compile_caches_by_trimmed_text() {
        let evaluator = Evaluator::with_capacity(2);
        let first = evaluator.compile("1 + 1").unwrap();
        let second = evaluator.compile("  1 + 1 ").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(evaluator.cache_len(), 1);

        assert!(evaluator.compile("1 +").is_err());
        assert_eq!(evaluator.cache_len(), 1);

        evaluator.compile("2").unwrap();
        evaluator.compile("3").unwrap();
        assert_eq!(evaluator.cache_len(), 2);

        evaluator.clear_cache();
        assert_eq!(evaluator.cache_len(), 0);
    }

    proptest! {
        #[test]
        fn prop_cache_is_transparent(
            a in -1000i32..1000,
            b in 1i32..1000,
            op in prop::sample::select(vec!["+", "-", "*", "/", "%"]),
        ) {
            let sheet = Sheet::new();
            let vars = Vars::new();
            let ctx = sheet.ctx(&vars);
            let expression = format!("floor(({} {} {}) + mod(attr.str))", a, op, b);

            let cached = Evaluator::with_capacity(1);
            let first = cached.evaluate(&expression, &ctx);
            let second = cached.evaluate(&expression, &ctx);
            let uncached = Evaluator::with_capacity(0).evaluate(&expression, &ctx);

            prop_assert_eq!(first, second);
            prop_assert_eq!(first, uncached);
        }
    }
}
