//! Visibility conditions.
//!
//! Conditions are written in a small Python-flavoured grammar:
//!
//! ```text
//! condition  := or
//! or         := and ("or" and)*
//! and        := not ("and" not)*
//! not        := "not" not | comparison
//! comparison := operand (("==" | "!=" | "<" | "<=" | ">" | ">=" | "in" | "not" "in") operand)?
//! operand    := STRING | NUMBER | "True" | "False" | "None" | IDENT
//!             | "(" condition ")" | "(" items ")" | "[" items "]"
//! ```
//!
//! Identifiers name question ids and resolve against the current answers. The text is
//! parsed into an [`Expr`] tree; nothing in it is ever executed.

mod lexer;
mod parser;

pub(crate) use lexer::is_reserved_word;

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::answers::AnswerSet;

/// Reasons a condition cannot be parsed or evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionError {
    #[error("unexpected character '{found}' at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },
    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("invalid number '{text}' at offset {offset}")]
    InvalidNumber { text: String, offset: usize },
    #[error("expected {expected} at offset {offset}, found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        offset: usize,
    },
    #[error("chained comparison at offset {offset} is not supported")]
    ChainedComparison { offset: usize },
    #[error("condition nested too deeply at offset {offset}")]
    TooDeep { offset: usize },
    #[error("'{0}' has no answer yet")]
    UnknownVariable(String),
    #[error("cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
        }
    }
}

/// Parsed condition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    Literal {
        value: Value,
    },
    Var {
        name: String,
    },
    List {
        items: Vec<Expr>,
    },
    Not {
        expression: Box<Expr>,
    },
    And {
        expressions: Vec<Expr>,
    },
    Or {
        expressions: Vec<Expr>,
    },
    Compare {
        cmp: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn parse(source: &str) -> Result<Self, ConditionError> {
        parser::parse(source)
    }

    /// Evaluates the expression to a value.
    ///
    /// `and`/`or` short-circuit, so a branch that is never reached may reference
    /// questions without answers.
    pub fn evaluate(&self, answers: &AnswerSet) -> Result<Value, ConditionError> {
        match self {
            Expr::Literal { value } => Ok(value.clone()),
            Expr::Var { name } => answers
                .get(name)
                .cloned()
                .ok_or_else(|| ConditionError::UnknownVariable(name.clone())),
            Expr::List { items } => items
                .iter()
                .map(|item| item.evaluate(answers))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Not { expression } => {
                let value = expression.evaluate(answers)?;
                Ok(Value::Bool(!truthy(&value)))
            }
            Expr::And { expressions } => {
                for expr in expressions {
                    if !expr.evaluate_bool(answers)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Expr::Or { expressions } => {
                for expr in expressions {
                    if expr.evaluate_bool(answers)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Expr::Compare { cmp, left, right } => {
                let left = left.evaluate(answers)?;
                let right = right.evaluate(answers)?;
                compare(*cmp, &left, &right).map(Value::Bool)
            }
        }
    }

    pub fn evaluate_bool(&self, answers: &AnswerSet) -> Result<bool, ConditionError> {
        self.evaluate(answers).map(|value| truthy(&value))
    }

    /// Question ids referenced anywhere in the expression.
    pub fn variables(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            Expr::Literal { .. } => {}
            Expr::Var { name } => {
                names.insert(name.as_str());
            }
            Expr::List { items: children }
            | Expr::And {
                expressions: children,
            }
            | Expr::Or {
                expressions: children,
            } => {
                for child in children {
                    child.collect_variables(names);
                }
            }
            Expr::Not { expression } => expression.collect_variables(names),
            Expr::Compare { left, right, .. } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(num) => num.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "None",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => a.as_f64() == b.as_f64(),
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| equals(a, b))
        }
        _ => left == right,
    }
}

fn compare(cmp: CompareOp, left: &Value, right: &Value) -> Result<bool, ConditionError> {
    let mismatch = || ConditionError::TypeMismatch {
        op: cmp.symbol(),
        left: type_name(left),
        right: type_name(right),
    };
    match cmp {
        CompareOp::Eq => Ok(equals(left, right)),
        CompareOp::Ne => Ok(!equals(left, right)),
        CompareOp::In | CompareOp::NotIn => {
            let found = match (left, right) {
                (_, Value::Array(items)) => items.iter().any(|item| equals(left, item)),
                (Value::String(needle), Value::String(haystack)) => {
                    haystack.contains(needle.as_str())
                }
                _ => return Err(mismatch()),
            };
            Ok(found == (cmp == CompareOp::In))
        }
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let ordering = match (left, right) {
                (Value::Number(a), Value::Number(b)) => a
                    .as_f64()
                    .zip(b.as_f64())
                    .and_then(|(a, b)| a.partial_cmp(&b))
                    .ok_or_else(mismatch)?,
                (Value::String(a), Value::String(b)) => a.cmp(b),
                _ => return Err(mismatch()),
            };
            Ok(match cmp {
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Le => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}
