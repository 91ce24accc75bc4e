//! Tokenizer for formula strings

use super::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Bang,
    Question,
    Colon,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Str(s) => format!("string '{}'", s),
            Token::Ident(name) => format!("identifier '{}'", name),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Caret => "^",
            Token::Bang => "!",
            Token::Question => "?",
            Token::Colon => ":",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Number(_) | Token::Str(_) | Token::Ident(_) => "",
        }
    }
}

/// A token and the byte offset it starts at
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Spanned>, ParseError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let peek = |i: usize| chars.get(i).map(|(_, c)| *c);

    while i < chars.len() {
        let (offset, c) = chars[i];
        let single = match c {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            ',' => Some(Token::Comma),
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '%' => Some(Token::Percent),
            '^' => Some(Token::Caret),
            '?' => Some(Token::Question),
            ':' => Some(Token::Colon),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push(Spanned { token, offset });
            i += 1;
            continue;
        }

        match c {
            c if c.is_whitespace() => i += 1,
            '.' if !peek(i + 1).is_some_and(|n| n.is_ascii_digit()) => {
                tokens.push(Spanned { token: Token::Dot, offset });
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                // exponent only when digits follow, so `2e` stays a number then a name
                if matches!(peek(i), Some('e' | 'E')) {
                    let digits_at = if matches!(peek(i + 1), Some('+' | '-')) { i + 2 } else { i + 1 };
                    if peek(digits_at).is_some_and(|d| d.is_ascii_digit()) {
                        i = digits_at;
                        while peek(i).is_some_and(|d| d.is_ascii_digit()) {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().map(|(_, c)| c).collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| ParseError::InvalidNumber(text.clone()))?;
                tokens.push(Spanned {
                    token: Token::Number(number),
                    offset,
                });
            }
            '\'' | '"' => {
                let quote = c;
                i += 1;
                let mut text = String::new();
                loop {
                    match peek(i) {
                        None => return Err(ParseError::UnterminatedString(offset)),
                        Some('\\') => {
                            match peek(i + 1) {
                                Some(escaped) => text.push(escaped),
                                None => return Err(ParseError::UnterminatedString(offset)),
                            }
                            i += 2;
                        }
                        Some(ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            text.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Spanned {
                    token: Token::Str(text),
                    offset,
                });
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '_' || chars[i].1 == '$')
                {
                    i += 1;
                }
                let name: String = chars[start..i].iter().map(|(_, c)| c).collect();
                tokens.push(Spanned {
                    token: Token::Ident(name),
                    offset,
                });
            }
            '<' | '>' | '=' | '!' | '&' | '|' => {
                let next = peek(i + 1);
                let (token, width) = match (c, next) {
                    ('<', Some('=')) => (Token::Le, 2),
                    ('<', _) => (Token::Lt, 1),
                    ('>', Some('=')) => (Token::Ge, 2),
                    ('>', _) => (Token::Gt, 1),
                    ('=', Some('=')) => (Token::EqEq, 2),
                    ('!', Some('=')) => (Token::NotEq, 2),
                    ('!', _) => (Token::Bang, 1),
                    ('&', Some('&')) => (Token::AndAnd, 2),
                    ('|', Some('|')) => (Token::OrOr, 2),
                    _ => return Err(ParseError::UnexpectedChar { ch: c, offset }),
                };
                // Tolerate the strict forms `===` and `!==`
                let width = if matches!(token, Token::EqEq | Token::NotEq) && peek(i + 2) == Some('=') {
                    3
                } else {
                    width
                };
                tokens.push(Spanned { token, offset });
                i += width;
            }
            other => return Err(ParseError::UnexpectedChar { ch: other, offset }),
        }
    }

    Ok(tokens)
}
