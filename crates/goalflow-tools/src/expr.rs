//! Safe arithmetic evaluation.
//!
//! Expressions are tokenized and parsed by recursive descent into a value;
//! nothing is ever handed to a general-purpose interpreter. The grammar is
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | power
//! power   := operand ('^' operand)*
//! operand := '-' operand | primary
//! primary := NUMBER | '(' expr ')'
//! ```
//!
//! so `^` binds tighter than a leading unary minus (`-2^2 == -4`) and every
//! binary operator, `^` included, associates left (`2^3^2 == 64`).

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Nesting limit for parentheses and chained unary minus.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unexpected {found} at position {pos}")]
    UnexpectedToken { found: String, pos: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unbalanced parentheses")]
    UnbalancedParens,
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not a finite number")]
    NonFinite,
    #[error("expression nested too deeply")]
    TooDeep,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tok {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Num(n) => format!("number {}", n),
            Tok::Plus => "'+'".into(),
            Tok::Minus => "'-'".into(),
            Tok::Star => "'*'".into(),
            Tok::Slash => "'/'".into(),
            Tok::Caret => "'^'".into(),
            Tok::LParen => "'('".into(),
            Tok::RParen => "')'".into(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(Tok, usize)>, ExprError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let tok = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| ExprError::InvalidNumber(text.clone()))?;
                tokens.push((Tok::Num(value), start));
                continue;
            }
            '+' => Tok::Plus,
            '-' => Tok::Minus,
            '*' => Tok::Star,
            '/' => Tok::Slash,
            '^' => Tok::Caret,
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            other => return Err(ExprError::UnexpectedChar { ch: other, pos: i }),
        };
        tokens.push((tok, i));
        i += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Tok, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Tok> {
        self.tokens.get(self.pos).map(|(t, _)| *t)
    }

    fn advance(&mut self) -> Option<Tok> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn unexpected(&self) -> ExprError {
        match self.tokens.get(self.pos) {
            Some((Tok::RParen, _)) => ExprError::UnbalancedParens,
            Some((tok, pos)) => ExprError::UnexpectedToken {
                found: tok.describe(),
                pos: *pos,
            },
            None => ExprError::UnexpectedEnd,
        }
    }

    fn descend(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep);
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<f64, ExprError> {
        let mut acc = self.term()?;
        loop {
            match self.peek() {
                Some(Tok::Plus) => {
                    self.advance();
                    acc += self.term()?;
                }
                Some(Tok::Minus) => {
                    self.advance();
                    acc -= self.term()?;
                }
                _ => return Ok(acc),
            }
        }
    }

    fn term(&mut self) -> Result<f64, ExprError> {
        let mut acc = self.unary()?;
        loop {
            match self.peek() {
                Some(Tok::Star) => {
                    self.advance();
                    acc *= self.unary()?;
                }
                Some(Tok::Slash) => {
                    self.advance();
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(ExprError::DivisionByZero);
                    }
                    acc /= rhs;
                }
                _ => return Ok(acc),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, ExprError> {
        if self.peek() == Some(Tok::Minus) {
            self.advance();
            self.descend()?;
            let value = self.unary()?;
            self.depth -= 1;
            return Ok(-value);
        }
        self.power()
    }

    fn power(&mut self) -> Result<f64, ExprError> {
        let mut acc = self.operand()?;
        while self.peek() == Some(Tok::Caret) {
            self.advance();
            acc = acc.powf(self.operand()?);
        }
        Ok(acc)
    }

    fn operand(&mut self) -> Result<f64, ExprError> {
        if self.peek() == Some(Tok::Minus) {
            self.advance();
            self.descend()?;
            let value = self.operand()?;
            self.depth -= 1;
            return Ok(-value);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<f64, ExprError> {
        match self.peek() {
            Some(Tok::Num(n)) => {
                self.advance();
                Ok(n)
            }
            Some(Tok::LParen) => {
                self.advance();
                self.descend()?;
                let value = self.expr()?;
                self.depth -= 1;
                match self.advance() {
                    Some(Tok::RParen) => Ok(value),
                    _ => Err(ExprError::UnbalancedParens),
                }
            }
            _ => Err(self.unexpected()),
        }
    }
}

/// Evaluate an arithmetic expression.
pub fn evaluate(input: &str) -> Result<f64, ExprError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.unexpected());
    }
    if !value.is_finite() {
        return Err(ExprError::NonFinite);
    }
    Ok(value)
}

fn expression_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[0-9]+(?:\.[0-9]+)?|[-+*/^()]").expect("static regex is valid")
    })
}

/// Pull an arithmetic expression out of free text.
///
/// Keeps numbers, operators and parentheses in order, joined by spaces.
/// Returns `None` when the text has no operator at all.
pub fn extract_expression(text: &str) -> Option<String> {
    let tokens: Vec<&str> = expression_token_re()
        .find_iter(text)
        .map(|m| m.as_str())
        .collect();

    let has_number = tokens.iter().any(|t| t.as_bytes()[0].is_ascii_digit());
    let has_operator = tokens
        .iter()
        .any(|t| matches!(*t, "+" | "-" | "*" | "/" | "^"));
    if !has_number || !has_operator {
        return None;
    }
    let normalized: Vec<&str> = tokens.into_iter().map(strip_leading_zeros).collect();
    Some(normalized.join(" "))
}

/// `007` becomes `7`; `0`, `0.5` and operators pass through.
fn strip_leading_zeros(token: &str) -> &str {
    let stripped = token.trim_start_matches('0');
    if stripped.is_empty() || stripped.starts_with('.') {
        &token[token.len() - stripped.len() - 1..]
    } else {
        stripped
    }
}
