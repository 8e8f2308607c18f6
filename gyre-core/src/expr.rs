//! Sandboxed convergence expression evaluator.
//!
//! Parses and evaluates small boolean/arithmetic expressions such as
//! `average <= 100` or `done || (error_rate < 0.05 && samples >= 10)`
//! against a single output namespace. The language is deliberately tiny:
//! identifiers resolve only inside the supplied scope, there are no calls,
//! no assignment, and no escape into general evaluation.
//!
//! Expressions are parsed at build time so malformed conditions surface as
//! configuration errors before the first iteration runs.

use crate::error::{GyreError, Result};
use crate::value::Value;
use std::fmt;

/// Binary operators, grouped by precedence (low to high: or, and,
/// comparison, additive, multiplicative).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Or,
    And,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    Add,
    Sub,
    Mul,
    Div,
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Bool(bool),
    Str(String),
    /// Dot-separated field path into the evaluation scope.
    Field(Vec<String>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// Intermediate value during evaluation.
#[derive(Debug, Clone, PartialEq)]
enum EvalValue {
    Num(f64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for EvalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Str(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// A compiled convergence expression.
///
/// # Example
///
/// ```
/// use gyre_core::expr::ConvergenceExpr;
/// use gyre_core::value::Value;
/// use serde_json::json;
///
/// let expr = ConvergenceExpr::parse("average <= 100").unwrap();
/// let scope = Value(json!({"average": 96.3}));
/// assert!(expr.eval(&scope).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct ConvergenceExpr {
    raw: String,
    root: Expr,
}

impl ConvergenceExpr {
    /// Parse an expression, failing on malformed input.
    pub fn parse(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        let mut parser = Parser {
            raw: input,
            tokens,
            pos: 0,
        };
        let root = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(syntax_error(
                input,
                format!("unexpected trailing token '{}'", parser.tokens[parser.pos]),
            ));
        }
        Ok(Self {
            raw: input.to_string(),
            root,
        })
    }

    /// Get the original expression text.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Evaluate against an output namespace.
    ///
    /// Returns an error if the expression does not produce a boolean or
    /// references a field absent from the scope; both are configuration
    /// bugs, not transient conditions.
    pub fn eval(&self, scope: &Value) -> Result<bool> {
        match self.eval_expr(&self.root, scope)? {
            EvalValue::Bool(b) => Ok(b),
            other => Err(syntax_error(
                &self.raw,
                format!("expression evaluated to {} instead of a boolean", other),
            )),
        }
    }

    fn eval_expr(&self, expr: &Expr, scope: &Value) -> Result<EvalValue> {
        match expr {
            Expr::Number(n) => Ok(EvalValue::Num(*n)),
            Expr::Bool(b) => Ok(EvalValue::Bool(*b)),
            Expr::Str(s) => Ok(EvalValue::Str(s.clone())),
            Expr::Field(path) => self.resolve_field(path, scope),
            Expr::Not(inner) => match self.eval_expr(inner, scope)? {
                EvalValue::Bool(b) => Ok(EvalValue::Bool(!b)),
                other => Err(syntax_error(
                    &self.raw,
                    format!("'!' applied to non-boolean {}", other),
                )),
            },
            Expr::Neg(inner) => match self.eval_expr(inner, scope)? {
                EvalValue::Num(n) => Ok(EvalValue::Num(-n)),
                other => Err(syntax_error(
                    &self.raw,
                    format!("'-' applied to non-number {}", other),
                )),
            },
            Expr::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, scope),
        }
    }

    fn eval_binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr, scope: &Value) -> Result<EvalValue> {
        // Short-circuit boolean operators before evaluating the right side.
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let l = self.expect_bool(lhs, scope)?;
            return match (op, l) {
                (BinaryOp::And, false) => Ok(EvalValue::Bool(false)),
                (BinaryOp::Or, true) => Ok(EvalValue::Bool(true)),
                _ => Ok(EvalValue::Bool(self.expect_bool(rhs, scope)?)),
            };
        }

        let l = self.eval_expr(lhs, scope)?;
        let r = self.eval_expr(rhs, scope)?;

        match op {
            BinaryOp::Eq => Ok(EvalValue::Bool(values_equal(&l, &r))),
            BinaryOp::Ne => Ok(EvalValue::Bool(!values_equal(&l, &r))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let (a, b) = (self.expect_num(l)?, self.expect_num(r)?);
                let result = match op {
                    BinaryOp::Lt => a < b,
                    BinaryOp::Le => a <= b,
                    BinaryOp::Gt => a > b,
                    BinaryOp::Ge => a >= b,
                    _ => unreachable!(),
                };
                Ok(EvalValue::Bool(result))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                let (a, b) = (self.expect_num(l)?, self.expect_num(r)?);
                let result = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    _ => unreachable!(),
                };
                Ok(EvalValue::Num(result))
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn expect_bool(&self, expr: &Expr, scope: &Value) -> Result<bool> {
        match self.eval_expr(expr, scope)? {
            EvalValue::Bool(b) => Ok(b),
            other => Err(syntax_error(
                &self.raw,
                format!("expected boolean operand, got {}", other),
            )),
        }
    }

    fn expect_num(&self, value: EvalValue) -> Result<f64> {
        match value {
            EvalValue::Num(n) => Ok(n),
            other => Err(syntax_error(
                &self.raw,
                format!("expected numeric operand, got {}", other),
            )),
        }
    }

    fn resolve_field(&self, path: &[String], scope: &Value) -> Result<EvalValue> {
        let joined = path.join(".");
        let value = scope.get_field(&joined).ok_or_else(|| {
            syntax_error(&self.raw, format!("field '{}' not found in scope", joined))
        })?;

        match value.inner() {
            serde_json::Value::Bool(b) => Ok(EvalValue::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(EvalValue::Num).ok_or_else(|| {
                syntax_error(&self.raw, format!("field '{}' is not a finite number", joined))
            }),
            serde_json::Value::String(s) => Ok(EvalValue::Str(s.clone())),
            other => Err(syntax_error(
                &self.raw,
                format!("field '{}' has non-scalar type: {}", joined, other),
            )),
        }
    }
}

fn values_equal(l: &EvalValue, r: &EvalValue) -> bool {
    match (l, r) {
        (EvalValue::Num(a), EvalValue::Num(b)) => a == b,
        (EvalValue::Bool(a), EvalValue::Bool(b)) => a == b,
        (EvalValue::Str(a), EvalValue::Str(b)) => a == b,
        _ => false,
    }
}

fn syntax_error(expression: &str, cause: impl Into<String>) -> GyreError {
    GyreError::ConvergenceExpression {
        expression: expression.to_string(),
        cause: cause.into(),
    }
}

/// Lexical token.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Str(String),
    Op(&'static str),
    LParen,
    RParen,
    Dot,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Ident(s) => write!(f, "{}", s),
            Self::Str(s) => write!(f, "\"{}\"", s),
            Self::Op(op) => write!(f, "{}", op),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
            Self::Dot => write!(f, "."),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '"' | '\'' => {
                let quote = ch;
                chars.next();
                let mut s = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == quote {
                        closed = true;
                        break;
                    }
                    s.push(c);
                }
                if !closed {
                    return Err(syntax_error(input, "unterminated string literal"));
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() => {
                let mut num = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        // A digit followed by '.' then a non-digit is a
                        // field access on a number, which we reject below.
                        num.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value: f64 = num
                    .parse()
                    .map_err(|_| syntax_error(input, format!("invalid number '{}'", num)))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            '<' | '>' | '=' | '!' => {
                chars.next();
                let two = chars.peek() == Some(&'=');
                let op = match (ch, two) {
                    ('<', true) => "<=",
                    ('<', false) => "<",
                    ('>', true) => ">=",
                    ('>', false) => ">",
                    ('=', true) => "==",
                    ('!', true) => "!=",
                    ('!', false) => "!",
                    ('=', false) => {
                        return Err(syntax_error(input, "'=' is not an operator; use '=='"));
                    }
                    _ => unreachable!(),
                };
                if two {
                    chars.next();
                }
                tokens.push(Token::Op(op));
            }
            '&' | '|' => {
                chars.next();
                if chars.peek() == Some(&ch) {
                    chars.next();
                    tokens.push(Token::Op(if ch == '&' { "&&" } else { "||" }));
                } else {
                    return Err(syntax_error(
                        input,
                        format!("single '{}' is not an operator", ch),
                    ));
                }
            }
            '+' => {
                chars.next();
                tokens.push(Token::Op("+"));
            }
            '-' => {
                chars.next();
                tokens.push(Token::Op("-"));
            }
            '*' => {
                chars.next();
                tokens.push(Token::Op("*"));
            }
            '/' => {
                chars.next();
                tokens.push(Token::Op("/"));
            }
            other => {
                return Err(syntax_error(
                    input,
                    format!("unexpected character '{}'", other),
                ));
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    raw: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next_op(&mut self, candidates: &[&'static str]) -> Option<&'static str> {
        if let Some(Token::Op(op)) = self.peek() {
            if let Some(&matched) = candidates.iter().find(|&&c| c == *op) {
                self.pos += 1;
                return Some(matched);
            }
        }
        None
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.next_op(&["||"]).is_some() {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_cmp()?;
        while self.next_op(&["&&"]).is_some() {
            let rhs = self.parse_cmp()?;
            lhs = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> Result<Expr> {
        let lhs = self.parse_add()?;
        if let Some(op) = self.next_op(&["<=", "<", ">=", ">", "==", "!="]) {
            let rhs = self.parse_add()?;
            let op = match op {
                "<" => BinaryOp::Lt,
                "<=" => BinaryOp::Le,
                ">" => BinaryOp::Gt,
                ">=" => BinaryOp::Ge,
                "==" => BinaryOp::Eq,
                "!=" => BinaryOp::Ne,
                _ => unreachable!(),
            };
            return Ok(Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_mul()?;
        while let Some(op) = self.next_op(&["+", "-"]) {
            let rhs = self.parse_mul()?;
            lhs = Expr::Binary {
                op: if op == "+" { BinaryOp::Add } else { BinaryOp::Sub },
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.next_op(&["*", "/"]) {
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op: if op == "*" { BinaryOp::Mul } else { BinaryOp::Div },
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.next_op(&["!"]).is_some() {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        if self.next_op(&["-"]).is_some() {
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.peek().cloned() {
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Some(Token::Str(s)) => {
                self.pos += 1;
                Ok(Expr::Str(s))
            }
            Some(Token::Ident(ident)) => {
                self.pos += 1;
                match ident.as_str() {
                    "true" => Ok(Expr::Bool(true)),
                    "false" => Ok(Expr::Bool(false)),
                    _ => {
                        let mut path = vec![ident];
                        while matches!(self.peek(), Some(Token::Dot)) {
                            self.pos += 1;
                            match self.peek().cloned() {
                                Some(Token::Ident(part)) => {
                                    self.pos += 1;
                                    path.push(part);
                                }
                                _ => {
                                    return Err(syntax_error(
                                        self.raw,
                                        "expected identifier after '.'",
                                    ));
                                }
                            }
                        }
                        Ok(Expr::Field(path))
                    }
                }
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(syntax_error(self.raw, "expected ')'")),
                }
            }
            Some(other) => Err(syntax_error(
                self.raw,
                format!("unexpected token '{}'", other),
            )),
            None => Err(syntax_error(self.raw, "unexpected end of expression")),
        }
    }
}
