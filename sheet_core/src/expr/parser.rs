//! Recursive-descent parser producing a compiled formula tree
//!
//! Precedence, loosest first:
//! `?:`, `|| or`, `&& and`, `== !=`, `< <= > >=`, `+ -`, `* / %`,
//! unary `- + ! not`, `^` (right associative), then postfix `.name`,
//! `[index]` and calls.

use super::error::ParseError;
use super::lexer::{tokenize, Spanned, Token};

/// Deepest tree a formula may build
///
/// Brackets, unary operators and exponents nest one level each, and so does
/// every operator in a left-associative chain like `a + b + c` or `a.b[c]`.
pub const MAX_DEPTH: usize = 128;

/// The fixed builtin function library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Floor,
    Ceil,
    Round,
    Min,
    Max,
    Clamp,
    Mod,
    Lookup,
    Roll,
    TakeHigherOf,
    TakeLowerOf,
    Cap,
    CapValue,
    Bonus,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        let builtin = match name {
            "floor" => Builtin::Floor,
            "ceil" => Builtin::Ceil,
            "round" => Builtin::Round,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "clamp" => Builtin::Clamp,
            "mod" => Builtin::Mod,
            "lookup" => Builtin::Lookup,
            "roll" => Builtin::Roll,
            "take_higher_of" => Builtin::TakeHigherOf,
            "take_lower_of" => Builtin::TakeLowerOf,
            "cap" => Builtin::Cap,
            "cap_value" => Builtin::CapValue,
            "bonus" => Builtin::Bonus,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Floor => "floor",
            Builtin::Ceil => "ceil",
            Builtin::Round => "round",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Clamp => "clamp",
            Builtin::Mod => "mod",
            Builtin::Lookup => "lookup",
            Builtin::Roll => "roll",
            Builtin::TakeHigherOf => "take_higher_of",
            Builtin::TakeLowerOf => "take_lower_of",
            Builtin::Cap => "cap",
            Builtin::CapValue => "cap_value",
            Builtin::Bonus => "bonus",
        }
    }

    fn check_arity(self, got: usize) -> Result<(), ParseError> {
        let (ok, expected) = match self {
            Builtin::Min | Builtin::Max => (got >= 1, "at least 1"),
            Builtin::Clamp => (got == 3, "3"),
            Builtin::Lookup | Builtin::TakeHigherOf | Builtin::TakeLowerOf | Builtin::Cap => {
                (got == 2, "2")
            }
            Builtin::Floor
            | Builtin::Ceil
            | Builtin::Round
            | Builtin::Mod
            | Builtin::Roll
            | Builtin::CapValue
            | Builtin::Bonus => (got == 1, "1"),
        };
        if ok {
            Ok(())
        } else {
            Err(ParseError::Arity {
                name: self.name(),
                expected,
                got,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

/// Compiled formula
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Builtin, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Compile a formula string
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_conditional()?;
    if let Some(extra) = parser.peek_spanned() {
        return Err(ParseError::UnexpectedToken {
            found: extra.token.describe(),
            offset: extra.offset,
            expected: "end of expression",
        });
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_spanned(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Spanned> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(name)) if name == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), ParseError> {
        match self.advance() {
            Some(spanned) if spanned.token == token => Ok(()),
            Some(spanned) => Err(ParseError::UnexpectedToken {
                found: spanned.token.describe(),
                offset: spanned.offset,
                expected,
            }),
            None => Err(ParseError::UnexpectedEnd(expected)),
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // conditional = or ('?' conditional ':' conditional)?
    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let condition = self.parse_or()?;
        let expr = if self.eat(&Token::Question) {
            let then = self.parse_conditional()?;
            self.expect(Token::Colon, "':'")?;
            let otherwise = self.parse_conditional()?;
            Expr::Conditional(Box::new(condition), Box::new(then), Box::new(otherwise))
        } else {
            condition
        };
        self.leave();
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut left = self.parse_and()?;
        while self.eat(&Token::OrOr) || self.eat_word("or") {
            self.enter()?;
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut left = self.parse_equality()?;
        while self.eat(&Token::AndAnd) || self.eat_word("and") {
            self.enter()?;
            let right = self.parse_equality()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::Ne,
                _ => break,
            };
            self.pos += 1;
            self.enter()?;
            let right = self.parse_comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.pos += 1;
            self.enter()?;
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            self.enter()?;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.pos += 1;
            self.enter()?;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some(Token::Minus) => Some(UnaryOp::Neg),
            Some(Token::Plus) => Some(UnaryOp::Plus),
            Some(Token::Bang) => Some(UnaryOp::Not),
            Some(Token::Ident(name)) if name == "not" => Some(UnaryOp::Not),
            _ => None,
        };
        match op {
            Some(op) => {
                self.pos += 1;
                self.enter()?;
                let operand = self.parse_unary()?;
                self.leave();
                Ok(Expr::Unary(op, Box::new(operand)))
            }
            None => self.parse_power(),
        }
    }

    // power = postfix ('^' unary)?   (right associative)
    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_postfix()?;
        if self.eat(&Token::Caret) {
            self.enter()?;
            let exponent = self.parse_unary()?;
            self.leave();
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    self.enter()?;
                    match self.advance() {
                        Some(Spanned {
                            token: Token::Ident(name),
                            ..
                        }) => expr = Expr::Member(Box::new(expr), name.clone()),
                        Some(other) => {
                            return Err(ParseError::UnexpectedToken {
                                found: other.token.describe(),
                                offset: other.offset,
                                expected: "property name",
                            })
                        }
                        None => return Err(ParseError::UnexpectedEnd("property name")),
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    self.enter()?;
                    let index = self.parse_conditional()?;
                    self.expect(Token::RBracket, "']'")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Some(Token::LParen) => return Err(ParseError::NotCallable),
                _ => {
                    self.depth = base;
                    return Ok(expr);
                }
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let spanned = self
            .advance()
            .ok_or(ParseError::UnexpectedEnd("a value"))?;
        match &spanned.token {
            Token::Number(n) => Ok(Expr::Number(*n)),
            Token::Str(s) => Ok(Expr::Str(s.clone())),
            Token::LParen => {
                let inner = self.parse_conditional()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                _ if self.peek() == Some(&Token::LParen) => self.parse_call(name),
                _ => Ok(Expr::Ident(name.clone())),
            },
            other => Err(ParseError::UnexpectedToken {
                found: other.describe(),
                offset: spanned.offset,
                expected: "a value",
            }),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<Expr, ParseError> {
        let builtin =
            Builtin::from_name(name).ok_or_else(|| ParseError::UnknownFunction(name.to_string()))?;
        self.expect(Token::LParen, "'('")?;

        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.parse_conditional()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                self.expect(Token::RParen, "',' or ')'")?;
                break;
            }
        }

        builtin.check_arity(args.len())?;
        Ok(Expr::Call(builtin, args))
    }
}
