//! Filter expression trees and inequality classification.
//!
//! An [`Expr`] is a boolean combination of single-property comparisons. The
//! same tree is used for the filters pushed down to a backend and for the
//! residual filters evaluated locally against each returned record.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FilterError;
use crate::types::Value;

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl Operator {
    /// Parse an operator symbol.
    pub fn from_symbol(symbol: &str) -> Result<Self, FilterError> {
        match symbol {
            "=" | "==" => Ok(Operator::Eq),
            "!=" => Ok(Operator::Ne),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            other => Err(FilterError::UnsupportedOperator(other.to_string())),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }

    /// Every operator other than `=` is an inequality.
    pub fn is_inequality(self) -> bool {
        self != Operator::Eq
    }

    /// `<`, `<=`, `>` and `>=`: the operators that need an ordering.
    pub fn is_ordering(self) -> bool {
        matches!(self, Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A single-property comparison: `property <op> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub property: String,
    pub op: Operator,
    pub value: Value,
}

impl Comparison {
    pub fn new(property: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            op,
            value: value.into(),
        }
    }

    pub fn is_inequality(&self) -> bool {
        self.op.is_inequality()
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.property, self.op, self.value)
    }
}

/// A filter expression tree.
///
/// Designed to be serializable for transport (JSON / MessagePack).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Comparison(Comparison),
    /// All children must hold. Empty is vacuously true.
    And(Vec<Expr>),
    /// At least one child must hold. Empty is vacuously false.
    Or(Vec<Expr>),
}

impl Expr {
    /// Every inequality comparison in this tree, in depth-first child order.
    pub fn inequalities(&self) -> Vec<&Comparison> {
        let mut out = Vec::new();
        self.collect_inequalities(&mut out);
        out
    }

    fn collect_inequalities<'a>(&'a self, out: &mut Vec<&'a Comparison>) {
        match self {
            Expr::Comparison(c) => {
                if c.is_inequality() {
                    out.push(c);
                }
            }
            Expr::And(children) | Expr::Or(children) => {
                for child in children {
                    child.collect_inequalities(out);
                }
            }
        }
    }

    /// The first inequality comparison in this tree, if any.
    pub fn first_inequality(&self) -> Option<&Comparison> {
        match self {
            Expr::Comparison(c) => c.is_inequality().then_some(c),
            Expr::And(children) | Expr::Or(children) => {
                children.iter().find_map(Expr::first_inequality)
            }
        }
    }

    /// Nesting depth: a leaf is 1.
    pub fn depth(&self) -> usize {
        match self {
            Expr::Comparison(_) => 1,
            Expr::And(children) | Expr::Or(children) => {
                1 + children.iter().map(Expr::depth).max().unwrap_or(0)
            }
        }
    }
}

/// The first inequality across a list of (implicitly ANDed) filters.
pub fn first_inequality(filters: &[Expr]) -> Option<&Comparison> {
    filters.iter().find_map(Expr::first_inequality)
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Comparison(c) => write!(f, "{c}"),
            Expr::And(children) => write_group(f, children, "AND", "TRUE"),
            Expr::Or(children) => write_group(f, children, "OR", "FALSE"),
        }
    }
}

fn write_group(
    f: &mut fmt::Formatter<'_>,
    children: &[Expr],
    joiner: &str,
    empty: &str,
) -> fmt::Result {
    if children.is_empty() {
        return f.write_str(empty);
    }
    f.write_str("(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {joiner} ")?;
        }
        write!(f, "{child}")?;
    }
    f.write_str(")")
}

// ---------------------------------------------------------------------------
// Convenience constructors
// ---------------------------------------------------------------------------

impl Expr {
    /// `property <op> value`
    pub fn compare(property: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Expr::Comparison(Comparison::new(property, op, value))
    }

    /// `property = value`
    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, Operator::Eq, value)
    }

    /// `property != value`
    pub fn ne(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, Operator::Ne, value)
    }

    /// `property < value`
    pub fn lt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, Operator::Lt, value)
    }

    /// `property <= value`
    pub fn le(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, Operator::Le, value)
    }

    /// `property > value`
    pub fn gt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, Operator::Gt, value)
    }

    /// `property >= value`
    pub fn ge(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, Operator::Ge, value)
    }

    /// `expr1 AND expr2 AND ...`
    pub fn and(exprs: Vec<Expr>) -> Self {
        Expr::And(exprs)
    }

    /// `expr1 OR expr2 OR ...`
    pub fn or(exprs: Vec<Expr>) -> Self {
        Expr::Or(exprs)
    }
}

impl From<Comparison> for Expr {
    fn from(c: Comparison) -> Self {
        Expr::Comparison(c)
    }
}
