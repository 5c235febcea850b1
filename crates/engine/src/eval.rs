// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A small, deliberately restricted expression evaluator for
//! `condition`, `switch.expression`, and `script` nodes (§4.7, §9 open
//! question, decided in `DESIGN.md`).
//!
//! Grammar: identifiers and dotted member access, numeric/string/bool
//! literals, comparison (`== != < <= > >=`), boolean (`&& || !`),
//! arithmetic (`+ - * /`), and membership (`in`). No function calls,
//! no loops, no host code execution — this is a pure tree-walker over
//! an [`EvalContext`], never a sandboxed eval of a general-purpose
//! language.

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Variables and upstream outputs an expression may reference by name.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    pub variables: HashMap<String, JsonValue>,
    pub outputs: HashMap<String, JsonValue>,
}

impl EvalContext {
    pub fn lookup(&self, root: &str) -> Option<&JsonValue> {
        if root == "outputs" {
            return None; // `outputs.x` handled by member-access resolution below
        }
        self.variables.get(root).or_else(|| self.outputs.get(root))
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("unexpected character '{0}' in expression")]
    UnexpectedChar(char),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("type error: {0}")]
    TypeError(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    True,
    False,
    Op(&'static str),
    LParen,
    RParen,
    Dot,
    In,
    End,
}

fn tokenize(src: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(match c {
                    '+' => "+",
                    '-' => "-",
                    '*' => "*",
                    _ => "/",
                }));
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op("=="));
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op("!="));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Op("!"));
                i += 1;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op("<="));
                i += 2;
            }
            '<' => {
                tokens.push(Token::Op("<"));
                i += 1;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(">="));
                i += 2;
            }
            '>' => {
                tokens.push(Token::Op(">"));
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::Op("&&"));
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::Op("||"));
                i += 2;
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    s.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(EvalError::UnexpectedEnd);
                }
                i += 1; // closing quote
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let s: String = chars[start..i].iter().collect();
                let n: f64 = s.parse().map_err(|_| EvalError::UnexpectedChar(c))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let s: String = chars[start..i].iter().collect();
                tokens.push(match s.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "in" => Token::In,
                    _ => Token::Ident(s),
                });
            }
            other => return Err(EvalError::UnexpectedChar(other)),
        }
    }
    tokens.push(Token::End);
    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    ctx: &'a EvalContext,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect_op(&mut self, op: &'static str) -> bool {
        if self.peek() == &Token::Op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<JsonValue, EvalError> {
        let mut lhs = self.parse_and()?;
        while self.expect_op("||") {
            let rhs = self.parse_and()?;
            lhs = JsonValue::Bool(truthy(&lhs) || truthy(&rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<JsonValue, EvalError> {
        let mut lhs = self.parse_not()?;
        while self.expect_op("&&") {
            let rhs = self.parse_not()?;
            lhs = JsonValue::Bool(truthy(&lhs) && truthy(&rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<JsonValue, EvalError> {
        if self.expect_op("!") {
            let v = self.parse_not()?;
            return Ok(JsonValue::Bool(!truthy(&v)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<JsonValue, EvalError> {
        let lhs = self.parse_membership()?;
        for op in ["==", "!=", "<=", ">=", "<", ">"] {
            if self.expect_op(op) {
                let rhs = self.parse_membership()?;
                return Ok(JsonValue::Bool(compare(op, &lhs, &rhs)?));
            }
        }
        Ok(lhs)
    }

    fn parse_membership(&mut self) -> Result<JsonValue, EvalError> {
        let lhs = self.parse_additive()?;
        if self.peek() == &Token::In {
            self.advance();
            let rhs = self.parse_additive()?;
            let found = match &rhs {
                JsonValue::Array(items) => items.contains(&lhs),
                JsonValue::String(s) => lhs.as_str().map(|needle| s.contains(needle)).unwrap_or(false),
                _ => false,
            };
            return Ok(JsonValue::Bool(found));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<JsonValue, EvalError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            if self.expect_op("+") {
                let rhs = self.parse_multiplicative()?;
                lhs = add(&lhs, &rhs)?;
            } else if self.expect_op("-") {
                let rhs = self.parse_multiplicative()?;
                lhs = JsonValue::from(as_num(&lhs)? - as_num(&rhs)?);
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<JsonValue, EvalError> {
        let mut lhs = self.parse_unary()?;
        loop {
            if self.expect_op("*") {
                let rhs = self.parse_unary()?;
                lhs = JsonValue::from(as_num(&lhs)? * as_num(&rhs)?);
            } else if self.expect_op("/") {
                let rhs = self.parse_unary()?;
                lhs = JsonValue::from(as_num(&lhs)? / as_num(&rhs)?);
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<JsonValue, EvalError> {
        if self.expect_op("-") {
            let v = self.parse_unary()?;
            return Ok(JsonValue::from(-as_num(&v)?));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<JsonValue, EvalError> {
        match self.advance() {
            Token::Number(n) => Ok(JsonValue::from(n)),
            Token::Str(s) => Ok(JsonValue::String(s)),
            Token::True => Ok(JsonValue::Bool(true)),
            Token::False => Ok(JsonValue::Bool(false)),
            Token::LParen => {
                let v = self.parse_or()?;
                if self.peek() == &Token::RParen {
                    self.advance();
                } else {
                    return Err(EvalError::UnexpectedToken(format!("{:?}", self.peek())));
                }
                Ok(v)
            }
            Token::Ident(name) => self.resolve_path(name),
            other => Err(EvalError::UnexpectedToken(format!("{other:?}"))),
        }
    }

    fn resolve_path(&mut self, first: String) -> Result<JsonValue, EvalError> {
        let mut path = vec![first];
        while self.peek() == &Token::Dot {
            self.advance();
            match self.advance() {
                Token::Ident(seg) => path.push(seg),
                other => return Err(EvalError::UnexpectedToken(format!("{other:?}"))),
            }
        }
        let root = &path[0];
        let mut current = if root == "outputs" {
            JsonValue::Object(self.ctx.outputs.clone().into_iter().collect())
        } else if let Some(v) = self.ctx.lookup(root) {
            v.clone()
        } else {
            return Err(EvalError::UnknownIdentifier(path.join(".")));
        };
        for seg in &path[1..] {
            current = current.get(seg).cloned().unwrap_or(JsonValue::Null);
        }
        Ok(current)
    }
}

fn truthy(v: &JsonValue) -> bool {
    match v {
        JsonValue::Bool(b) => *b,
        JsonValue::Null => false,
        JsonValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
    }
}

fn as_num(v: &JsonValue) -> Result<f64, EvalError> {
    v.as_f64().ok_or_else(|| EvalError::TypeError(format!("expected number, got {v}")))
}

fn add(lhs: &JsonValue, rhs: &JsonValue) -> Result<JsonValue, EvalError> {
    match (lhs, rhs) {
        (JsonValue::String(a), JsonValue::String(b)) => Ok(JsonValue::String(format!("{a}{b}"))),
        _ => Ok(JsonValue::from(as_num(lhs)? + as_num(rhs)?)),
    }
}

fn compare(op: &str, lhs: &JsonValue, rhs: &JsonValue) -> Result<bool, EvalError> {
    if op == "==" {
        return Ok(json_eq(lhs, rhs));
    }
    if op == "!=" {
        return Ok(!json_eq(lhs, rhs));
    }
    if let (JsonValue::String(a), JsonValue::String(b)) = (lhs, rhs) {
        return Ok(match op {
            "<" => a < b,
            "<=" => a <= b,
            ">" => a > b,
            ">=" => a >= b,
            _ => unreachable!(),
        });
    }
    let a = as_num(lhs)?;
    let b = as_num(rhs)?;
    Ok(match op {
        "<" => a < b,
        "<=" => a <= b,
        ">" => a > b,
        ">=" => a >= b,
        _ => unreachable!(),
    })
}

fn json_eq(lhs: &JsonValue, rhs: &JsonValue) -> bool {
    if let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) {
        return a == b;
    }
    lhs == rhs
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Parse and evaluate `expr` against `ctx`, returning the raw value.
pub fn evaluate(expr: &str, ctx: &EvalContext) -> Result<JsonValue, EvalError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser { tokens, pos: 0, ctx };
    let value = parser.parse_or()?;
    if parser.peek() != &Token::End {
        return Err(EvalError::UnexpectedToken(format!("{:?}", parser.peek())));
    }
    Ok(value)
}

/// Evaluate `expr` as a boolean per §4.7: unparseable or failing
/// expressions evaluate to `false` and log a warning; they never
/// throw upward.
pub fn evaluate_bool(expr: &str, ctx: &EvalContext) -> bool {
    match evaluate(expr, ctx) {
        Ok(v) => truthy(&v),
        Err(e) => {
            tracing::warn!(expression = %expr, error = %e, "condition expression failed to evaluate, treating as false");
            false
        }
    }
}

#[cfg(test)]
#[path = "eval_tests.rs"]
mod tests;
