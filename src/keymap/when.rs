//! When-clause expressions gating keybindings
//!
//! A when-clause is a small boolean language over context keys:
//!
//! ```text
//! editorTextFocus && !terminalFocus
//! resourceExtname == '.md' || (panel != 'terminal' && tabCount == 3)
//! ```
//!
//! `!` binds tighter than `&&`, which binds tighter than `||`. Both binary
//! operators are left-associative. Comparisons take a context key on the left
//! and a literal (quoted string, number, `true`/`false` or a bare word) on the
//! right.
//!
//! Parsing never fails from the caller's point of view: text that does not
//! parse produces a clause that always evaluates to `false`, so a typo in a
//! keymap file disables the binding instead of enabling it everywhere. This is
//! different from having no clause at all, which means "always active".

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use super::context::{ContextKeys, ContextValue};

/// Deepest expression tree the parser will build
const MAX_DEPTH: usize = 128;

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Number(f64),
    Bool(bool),
}

impl Literal {
    fn matches(&self, value: &ContextValue) -> bool {
        match (value, self) {
            (ContextValue::String(a), Literal::Str(b)) => a == b,
            (ContextValue::Number(a), Literal::Number(b)) => a == b,
            (ContextValue::Bool(a), Literal::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => write!(f, "'{}'", s),
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Parsed when-clause expression
#[derive(Debug, Clone, PartialEq)]
pub enum WhenExpr {
    /// Bare context key, true when the key is truthy
    Key(String),
    Not(Box<WhenExpr>),
    Equals(String, Literal),
    NotEquals(String, Literal),
    And(Box<WhenExpr>, Box<WhenExpr>),
    Or(Box<WhenExpr>, Box<WhenExpr>),
}

impl WhenExpr {
    /// Evaluate against a context snapshot. Total: never panics.
    ///
    /// Comparisons against a missing key are false for both `==` and `!=`.
    pub fn eval(&self, ctx: &ContextKeys) -> bool {
        match self {
            WhenExpr::Key(key) => ctx.is_truthy(key),
            WhenExpr::Not(inner) => !inner.eval(ctx),
            WhenExpr::Equals(key, lit) => ctx.get(key).is_some_and(|v| lit.matches(v)),
            WhenExpr::NotEquals(key, lit) => ctx.get(key).is_some_and(|v| !lit.matches(v)),
            WhenExpr::And(left, right) => left.eval(ctx) && right.eval(ctx),
            WhenExpr::Or(left, right) => left.eval(ctx) || right.eval(ctx),
        }
    }

    /// Every context key this expression reads
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            WhenExpr::Key(key) | WhenExpr::Equals(key, _) | WhenExpr::NotEquals(key, _) => {
                if !out.contains(&key.as_str()) {
                    out.push(key);
                }
            }
            WhenExpr::Not(inner) => inner.collect_keys(out),
            WhenExpr::And(left, right) | WhenExpr::Or(left, right) => {
                left.collect_keys(out);
                right.collect_keys(out);
            }
        }
    }
}

impl fmt::Display for WhenExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhenExpr::Key(key) => write!(f, "{}", key),
            WhenExpr::Not(inner) => write!(f, "!{}", inner),
            WhenExpr::Equals(key, lit) => write!(f, "{} == {}", key, lit),
            WhenExpr::NotEquals(key, lit) => write!(f, "{} != {}", key, lit),
            WhenExpr::And(left, right) => write!(f, "({} && {})", left, right),
            WhenExpr::Or(left, right) => write!(f, "({} || {})", left, right),
        }
    }
}

/// Errors reported by [`WhenClause::try_parse`]
#[derive(Debug, Clone, PartialEq)]
pub enum WhenParseError {
    Empty,
    UnexpectedChar { ch: char, pos: usize },
    UnterminatedString { pos: usize },
    UnexpectedToken { found: String, pos: usize },
    UnexpectedEnd,
    ExpectedLiteral { pos: usize },
    TooDeep,
}

impl fmt::Display for WhenParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhenParseError::Empty => write!(f, "empty expression"),
            WhenParseError::UnexpectedChar { ch, pos } => {
                write!(f, "unexpected character {:?} at {}", ch, pos)
            }
            WhenParseError::UnterminatedString { pos } => {
                write!(f, "unterminated string starting at {}", pos)
            }
            WhenParseError::UnexpectedToken { found, pos } => {
                write!(f, "unexpected {} at {}", found, pos)
            }
            WhenParseError::UnexpectedEnd => write!(f, "unexpected end of expression"),
            WhenParseError::ExpectedLiteral { pos } => {
                write!(f, "expected a value after comparison at {}", pos)
            }
            WhenParseError::TooDeep => {
                write!(f, "expression nested deeper than {} levels", MAX_DEPTH)
            }
        }
    }
}

impl std::error::Error for WhenParseError {}

/// A when-clause as attached to a binding: source text plus parsed form
///
/// `expr` is `None` when the source failed to parse; such a clause never
/// matches.
#[derive(Debug, Clone, PartialEq)]
pub struct WhenClause {
    source: String,
    expr: Option<WhenExpr>,
}

impl WhenClause {
    /// Parse a clause, degrading to an always-false clause on malformed input
    pub fn parse(source: &str) -> Self {
        let expr = match Self::try_parse(source) {
            Ok(expr) => Some(expr),
            Err(e) => {
                tracing::warn!("Invalid when-clause {:?}: {} (binding disabled)", source, e);
                None
            }
        };
        Self {
            source: source.to_string(),
            expr,
        }
    }

    /// Parse a clause, reporting why it is malformed
    pub fn try_parse(source: &str) -> Result<WhenExpr, WhenParseError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(WhenParseError::Empty);
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.parse_or()?;
        match parser.peek() {
            None => Ok(expr),
            Some(tok) => Err(tok.unexpected()),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> Option<&WhenExpr> {
        self.expr.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.expr.is_some()
    }

    /// Evaluate against a context snapshot; invalid clauses are always false
    pub fn evaluate(&self, ctx: &ContextKeys) -> bool {
        self.expr.as_ref().is_some_and(|expr| expr.eval(ctx))
    }
}

impl fmt::Display for WhenClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Free-function form of [`WhenClause::parse`]
pub fn parse(source: &str) -> WhenClause {
    WhenClause::parse(source)
}

/// Free-function form of [`WhenClause::evaluate`]
pub fn evaluate(clause: &WhenClause, ctx: &ContextKeys) -> bool {
    clause.evaluate(ctx)
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Str(String),
    Number(f64),
    Not,
    And,
    Or,
    Eq,
    NotEq,
    LParen,
    RParen,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

impl Token {
    fn unexpected(&self) -> WhenParseError {
        let found = match &self.kind {
            TokenKind::Ident(s) => format!("identifier '{}'", s),
            TokenKind::Str(s) => format!("string '{}'", s),
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::Not => "'!'".to_string(),
            TokenKind::And => "'&&'".to_string(),
            TokenKind::Or => "'||'".to_string(),
            TokenKind::Eq => "'=='".to_string(),
            TokenKind::NotEq => "'!='".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
        };
        WhenParseError::UnexpectedToken {
            found,
            pos: self.pos,
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '-' | ':' | '/')
}

/// Consume the current char and, if the following one is `next`, that too
fn eat_pair(chars: &mut Peekable<CharIndices<'_>>, next: char) -> bool {
    chars.next();
    if chars.peek().map(|&(_, c)| c) == Some(next) {
        chars.next();
        true
    } else {
        false
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, WhenParseError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let kind = match c {
            '(' => {
                chars.next();
                TokenKind::LParen
            }
            ')' => {
                chars.next();
                TokenKind::RParen
            }
            '!' => {
                if eat_pair(&mut chars, '=') {
                    TokenKind::NotEq
                } else {
                    TokenKind::Not
                }
            }
            '&' => {
                if !eat_pair(&mut chars, '&') {
                    return Err(WhenParseError::UnexpectedChar { ch: '&', pos });
                }
                TokenKind::And
            }
            '|' => {
                if !eat_pair(&mut chars, '|') {
                    return Err(WhenParseError::UnexpectedChar { ch: '|', pos });
                }
                TokenKind::Or
            }
            '=' => {
                if !eat_pair(&mut chars, '=') {
                    return Err(WhenParseError::UnexpectedChar { ch: '=', pos });
                }
                TokenKind::Eq
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some((_, ch)) if ch == quote => break,
                        Some((_, ch)) => value.push(ch),
                        None => return Err(WhenParseError::UnterminatedString { pos }),
                    }
                }
                TokenKind::Str(value)
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut text = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '.' || (ch == '-' && text.is_empty()) {
                        text.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = text
                    .parse::<f64>()
                    .map_err(|_| WhenParseError::UnexpectedChar { ch: c, pos })?;
                TokenKind::Number(n)
            }
            c if is_ident_start(c) => {
                let mut ident = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if is_ident_char(ch) {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                TokenKind::Ident(ident)
            }
            other => return Err(WhenParseError::UnexpectedChar { ch: other, pos }),
        };

        tokens.push(Token { kind, pos });
    }

    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Depth of the node being parsed; bounds recursion on hostile input
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().map(|t| &t.kind) == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn descend(&mut self) -> Result<(), WhenParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(WhenParseError::TooDeep);
        }
        Ok(())
    }

    // Every operator in a left-associative chain adds a level to the tree,
    // so chains count against the depth limit as well as nesting.
    fn parse_or(&mut self) -> Result<WhenExpr, WhenParseError> {
        let base = self.depth;
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            self.descend()?;
            let right = self.parse_and()?;
            left = WhenExpr::Or(Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<WhenExpr, WhenParseError> {
        let base = self.depth;
        let mut left = self.parse_unary()?;
        while self.eat(&TokenKind::And) {
            self.descend()?;
            let right = self.parse_unary()?;
            left = WhenExpr::And(Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<WhenExpr, WhenParseError> {
        if self.eat(&TokenKind::Not) {
            self.descend()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(WhenExpr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<WhenExpr, WhenParseError> {
        let tok = self.next().ok_or(WhenParseError::UnexpectedEnd)?;
        match tok.kind {
            TokenKind::LParen => {
                self.descend()?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    Some(other) => Err(other.unexpected()),
                    None => Err(WhenParseError::UnexpectedEnd),
                }
            }
            TokenKind::Ident(key) => {
                if self.eat(&TokenKind::Eq) {
                    let lit = self.parse_literal(tok.pos)?;
                    Ok(WhenExpr::Equals(key, lit))
                } else if self.eat(&TokenKind::NotEq) {
                    let lit = self.parse_literal(tok.pos)?;
                    Ok(WhenExpr::NotEquals(key, lit))
                } else {
                    Ok(WhenExpr::Key(key))
                }
            }
            _ => Err(tok.unexpected()),
        }
    }

    fn parse_literal(&mut self, op_pos: usize) -> Result<Literal, WhenParseError> {
        let tok = self
            .next()
            .ok_or(WhenParseError::ExpectedLiteral { pos: op_pos })?;
        match tok.kind {
            TokenKind::Str(s) => Ok(Literal::Str(s)),
            TokenKind::Number(n) => Ok(Literal::Number(n)),
            TokenKind::Ident(word) if word == "true" => Ok(Literal::Bool(true)),
            TokenKind::Ident(word) if word == "false" => Ok(Literal::Bool(false)),
            TokenKind::Ident(word) => Ok(Literal::Str(word)),
            _ => Err(tok.unexpected()),
        }
    }
}
