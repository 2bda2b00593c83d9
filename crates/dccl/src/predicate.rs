//! Dynamic-presence predicate expressions (`omit_if` / `required_if`).
//!
//! Grammar (highest to lowest precedence):
//!
//! ```text
//! literal    := INT | FLOAT | STRING | "true" | "false"
//! path       := ("^")* IDENT ("." IDENT)*
//! primary    := literal | path | "(" expr ")" | "!" primary
//! comparison := primary (("==" | "!=" | "<" | "<=" | ">" | ">=") primary)?
//! and_expr   := comparison ("&&" comparison)*
//! expr       := and_expr ("||" and_expr)*
//! ```
//!
//! A leading run of `^` in a path steps that many levels up the ancestor
//! stack before resolving the remaining dotted segments against the message
//! found there (descending into nested `Message` fields by name). A bare
//! path with no leading `^` resolves against the message currently being
//! encoded or decoded.

use smartstring::{LazyCompact, SmartString};

use crate::context::Context;
use crate::value::WireValue;

type DcclString = SmartString<LazyCompact>;

/// A field reference inside a predicate: `ups` levels up the ancestor stack,
/// then a dotted path of field names from there.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPath {
    pub ups: usize,
    pub segments: Vec<DcclString>,
}

/// Comparison operators usable between two predicate sub-expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A parsed predicate expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Literal(WireValue),
    FieldRef(FieldPath),
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Cmp(CmpOp, Box<Predicate>, Box<Predicate>),
}

/// Failure resolving or comparing values while evaluating a predicate.
/// Callers attach the owning field's name before surfacing this as an
/// [`crate::error::EncodeError::PredicateTypeError`] or
/// [`crate::error::DecodeError::PredicateTypeError`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum PredicateError {
    #[error("field path '{0}' did not resolve to a value")]
    UnresolvedPath(String),
    #[error("cannot compare {0} to {1}")]
    Incomparable(&'static str, &'static str),
}

impl Predicate {
    /// Parses a predicate expression from source text.
    ///
    /// # Errors
    /// Returns a human-readable message on a syntax error; the caller wraps
    /// it in [`crate::error::SchemaError::PredicateParse`].
    pub fn parse(src: &str) -> Result<Predicate, String> {
        let tokens = lex(src)?;
        let mut parser = Parser { tokens: &tokens, pos: 0 };
        let expr = parser.parse_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(format!("unexpected trailing input at token {}", parser.pos));
        }
        Ok(expr)
    }

    /// Evaluates the predicate against `ctx`, returning a [`WireValue::Bool`]
    /// for boolean-valued predicates (the only kind `omit_if`/`required_if`
    /// actually need), or a scalar for sub-expressions used inside a `Cmp`.
    pub fn eval(&self, ctx: &Context) -> Result<WireValue, PredicateError> {
        match self {
            Predicate::Literal(v) => Ok(v.clone()),
            Predicate::FieldRef(path) => ctx
                .resolve_path(path)
                .ok_or_else(|| PredicateError::UnresolvedPath(format_path(path))),
            Predicate::Not(inner) => {
                let v = inner.eval(ctx)?;
                let b = v
                    .as_bool()
                    .ok_or(PredicateError::Incomparable("bool", v.kind_name()))?;
                Ok(WireValue::Bool(!b))
            }
            Predicate::And(a, b) => {
                let av = as_bool(a.eval(ctx)?)?;
                if !av {
                    return Ok(WireValue::Bool(false));
                }
                Ok(WireValue::Bool(as_bool(b.eval(ctx)?)?))
            }
            Predicate::Or(a, b) => {
                let av = as_bool(a.eval(ctx)?)?;
                if av {
                    return Ok(WireValue::Bool(true));
                }
                Ok(WireValue::Bool(as_bool(b.eval(ctx)?)?))
            }
            Predicate::Cmp(op, a, b) => {
                let av = a.eval(ctx)?;
                let bv = b.eval(ctx)?;
                Ok(WireValue::Bool(compare(*op, &av, &bv)?))
            }
        }
    }
}

fn as_bool(v: WireValue) -> Result<bool, PredicateError> {
    v.as_bool().ok_or(PredicateError::Incomparable("bool", v.kind_name()))
}

fn compare(op: CmpOp, a: &WireValue, b: &WireValue) -> Result<bool, PredicateError> {
    use WireValue::*;
    let ord = match (a, b) {
        (Str(x), Str(y)) => x.partial_cmp(y),
        (Bool(x), Bool(y)) => x.partial_cmp(y),
        (Bytes(x), Bytes(y)) => x.partial_cmp(y),
        _ => {
            let (x, y) = (
                a.as_float().ok_or(PredicateError::Incomparable("number", a.kind_name()))?,
                b.as_float().ok_or(PredicateError::Incomparable("number", b.kind_name()))?,
            );
            x.partial_cmp(&y)
        }
    };
    let ord = ord.ok_or(PredicateError::Incomparable(a.kind_name(), b.kind_name()))?;
    Ok(match op {
        CmpOp::Eq => ord == std::cmp::Ordering::Equal,
        CmpOp::Ne => ord != std::cmp::Ordering::Equal,
        CmpOp::Lt => ord == std::cmp::Ordering::Less,
        CmpOp::Le => ord != std::cmp::Ordering::Greater,
        CmpOp::Gt => ord == std::cmp::Ordering::Greater,
        CmpOp::Ge => ord != std::cmp::Ordering::Less,
    })
}

fn format_path(path: &FieldPath) -> String {
    format!("{}{}", "^".repeat(path.ups), path.segments.join("."))
}

// --- lexer ---

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    True,
    False,
    Caret,
    Dot,
    Not,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
}

fn lex(src: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ne);
                    i += 2;
                } else {
                    tokens.push(Token::Not);
                    i += 1;
                }
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Eq);
                i += 2;
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '"' => {
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    s.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err("unterminated string literal".to_owned());
                }
                i += 1;
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == '-') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                if text.contains('.') {
                    tokens.push(Token::Float(text.parse().map_err(|_| format!("bad number '{text}'"))?));
                } else {
                    tokens.push(Token::Int(text.parse().map_err(|_| format!("bad number '{text}'"))?));
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(match text.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => Token::Ident(text),
                });
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_expr(&mut self) -> Result<Predicate, String> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Predicate::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Predicate, String> {
        let mut lhs = self.parse_comparison()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_comparison()?;
            lhs = Predicate::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Predicate, String> {
        let lhs = self.parse_primary()?;
        let op = match self.peek() {
            Some(Token::Eq) => CmpOp::Eq,
            Some(Token::Ne) => CmpOp::Ne,
            Some(Token::Lt) => CmpOp::Lt,
            Some(Token::Le) => CmpOp::Le,
            Some(Token::Gt) => CmpOp::Gt,
            Some(Token::Ge) => CmpOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_primary()?;
        Ok(Predicate::Cmp(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_primary(&mut self) -> Result<Predicate, String> {
        match self.advance() {
            Some(Token::Not) => Ok(Predicate::Not(Box::new(self.parse_primary()?))),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                if !self.eat(&Token::RParen) {
                    return Err("expected closing ')'".to_owned());
                }
                Ok(inner)
            }
            Some(Token::True) => Ok(Predicate::Literal(WireValue::Bool(true))),
            Some(Token::False) => Ok(Predicate::Literal(WireValue::Bool(false))),
            Some(Token::Int(v)) => Ok(Predicate::Literal(WireValue::Int(*v))),
            Some(Token::Float(v)) => Ok(Predicate::Literal(WireValue::Float(*v))),
            Some(Token::Str(s)) => Ok(Predicate::Literal(WireValue::Str(s.clone()))),
            Some(Token::Caret) => {
                self.pos -= 1;
                self.parse_path()
            }
            Some(Token::Ident(_)) => {
                self.pos -= 1;
                self.parse_path()
            }
            other => Err(format!("unexpected token {other:?}")),
        }
    }

    fn parse_path(&mut self) -> Result<Predicate, String> {
        let mut ups = 0usize;
        while self.eat(&Token::Caret) {
            ups += 1;
        }
        let mut segments = Vec::new();
        match self.advance() {
            Some(Token::Ident(name)) => segments.push(DcclString::from(name.as_str())),
            other => return Err(format!("expected field name, found {other:?}")),
        }
        while self.eat(&Token::Dot) {
            match self.advance() {
                Some(Token::Ident(name)) => segments.push(DcclString::from(name.as_str())),
                other => return Err(format!("expected field name after '.', found {other:?}")),
            }
        }
        Ok(Predicate::FieldRef(FieldPath { ups, segments }))
    }
}
