//! Values, variables, and the terms that mention them.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

// ============================================================================
// Value
// ============================================================================

/// A bound value: what facts store and what computed relations produce.
///
/// Numbers are totally ordered (`-0.0` is folded into `0.0`) so values can
/// key indexes and candidate sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn number(n: impl Into<f64>) -> Self {
        Value::Number(n.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// An integral, finite number usable as a character offset.
    pub fn as_index(&self) -> Option<i64> {
        let n = self.as_number()?;
        if n.is_finite() && n.fract() == 0.0 && n.abs() < (i64::MAX as f64) {
            Some(n as i64)
        } else {
            None
        }
    }

    /// Values are "truthy" the way flag arguments expect: only `true`, a
    /// non-zero number, or non-empty text count.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Text(_) => 0,
            Value::Number(_) => 1,
            Value::Bool(_) => 2,
        }
    }

    fn number_bits(n: f64) -> u64 {
        if n == 0.0 {
            0.0f64.to_bits()
        } else {
            n.to_bits()
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => {
                let a = if *a == 0.0 { 0.0 } else { *a };
                let b = if *b == 0.0 { 0.0 } else { *b };
                a.total_cmp(&b)
            }
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Text(s) => s.hash(state),
            Value::Number(n) => Value::number_bits(*n).hash(state),
            Value::Bool(b) => b.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Integral numbers render without a fractional part (`3`, not `3.0`).
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 {
        format!("{:.0}", if n == 0.0 { 0.0 } else { n })
    } else {
        format!("{n}")
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

// ============================================================================
// Variables and terms
// ============================================================================

/// A slot in the query's global variable order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Variable(usize);

impl Variable {
    pub const fn new(position: usize) -> Self {
        Self(position)
    }

    pub const fn index(self) -> usize {
        self.0
    }

    /// Bound once the search depth has moved past this slot.
    pub const fn is_bound_at(self, depth: usize) -> bool {
        self.0 < depth
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?v{}", self.0)
    }
}

/// A constraint slot: either a query variable or a literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    Var(Variable),
    Const(Value),
}

impl Term {
    pub fn var(position: usize) -> Self {
        Term::Var(Variable::new(position))
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Term::Const(value.into())
    }

    pub fn variable(&self) -> Option<Variable> {
        match self {
            Term::Var(v) => Some(*v),
            Term::Const(_) => None,
        }
    }

    pub fn is_bound_at(&self, depth: usize) -> bool {
        match self {
            Term::Var(v) => v.is_bound_at(depth),
            Term::Const(_) => true,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(v) => write!(f, "{v}"),
            Term::Const(Value::Text(s)) => write!(f, "{s:?}"),
            Term::Const(value) => write!(f, "{value}"),
        }
    }
}

impl From<Value> for Term {
    fn from(value: Value) -> Self {
        Term::Const(value)
    }
}

impl From<Variable> for Term {
    fn from(v: Variable) -> Self {
        Term::Var(v)
    }
}
