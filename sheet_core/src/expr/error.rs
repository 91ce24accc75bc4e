//! Formula compile and evaluation errors

use thiserror::Error;

/// A formula that could not be compiled
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unexpected {found} at offset {offset}, expected {expected}")]
    UnexpectedToken {
        found: String,
        offset: usize,
        expected: &'static str,
    },
    #[error("unexpected end of expression, expected {0}")]
    UnexpectedEnd(&'static str),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("{name} expects {expected} argument(s), got {got}")]
    Arity {
        name: &'static str,
        expected: &'static str,
        got: usize,
    },
    #[error("only builtin functions can be called")]
    NotCallable,
    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),
}

/// Why a formula evaluated to the fallback `0`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("cannot read '{0}' of undefined")]
    UndefinedAccess(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not a number")]
    NotANumber,
    #[error("result {0} is not finite")]
    NonFinite(f64),
}
