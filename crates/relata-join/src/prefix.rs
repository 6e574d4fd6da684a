//! The binding prefix: the partial match threaded through every constraint.
//!
//! Position `i` holds the value of `Variable(i)`. Only the driver grows or
//! shrinks a prefix (push/pop at the frontier); constraints receive `&Prefix`
//! and read positions below `depth()`.

use crate::value::{Term, Value, Variable};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prefix {
    values: Vec<Value>,
}

impl Prefix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(variables: usize) -> Self {
        Self {
            values: Vec::with_capacity(variables),
        }
    }

    /// Build a prefix from already-bound values, in variable order.
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// Number of bound variables.
    pub fn depth(&self) -> usize {
        self.values.len()
    }

    /// The next unbound variable.
    pub fn frontier(&self) -> Variable {
        Variable::new(self.values.len())
    }

    pub fn get(&self, variable: Variable) -> Option<&Value> {
        self.values.get(variable.index())
    }

    pub fn is_bound(&self, variable: Variable) -> bool {
        variable.is_bound_at(self.depth())
    }

    /// The value of a term, if it is a constant or a bound variable.
    pub fn resolve<'a>(&'a self, term: &'a Term) -> Option<&'a Value> {
        match term {
            Term::Const(value) => Some(value),
            Term::Var(v) => self.get(*v),
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub(crate) fn truncate(&mut self, depth: usize) {
        self.values.truncate(depth);
    }
}
