//! Computed relations: functions queried as if they were stored relations.
//!
//! A [`Function`] maps bound arguments to the full set of output rows (one
//! row per result, one column per return attribute). [`ComputedConstraint`]
//! binds a function to one query occurrence and answers the constraint
//! protocol on top of it:
//!
//! - with every declared output bound, it is a membership test;
//! - with one output requested, it enumerates that projection;
//! - with several consecutive outputs requested, it enumerates tuples.
//!
//! A value the function cannot represent (text that is not a number, a
//! negative offset, ...) is an empty relation, never an error.

use std::sync::Arc;

use ahash::AHashSet;
use tracing::trace;

use crate::constraint::Constraint;
use crate::error::{JoinError, Result};
use crate::index::FactIndex;
use crate::mapping::{Arguments, CallSite, Signature};
use crate::prefix::Prefix;
use crate::proposal::{Proposal, Rows};
use crate::value::{Term, Value, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Produced,
    /// The input is outside the function's domain; no rows.
    Unrepresentable,
}

pub trait Function: std::fmt::Debug + Send + Sync {
    fn signature(&self) -> &Signature;

    /// Append every output row for `args` to `out`, whose width is the
    /// signature's output width.
    fn apply(&self, args: &Arguments<'_>, out: &mut Rows) -> Result<Outcome>;
}

/// Which outputs an occurrence declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// No outputs: the relation only filters.
    Filter,
    Single(usize),
    Joint(Vec<usize>),
}

impl Mode {
    fn from_returns(returns: &[Option<Term>]) -> Self {
        let declared: Vec<usize> = returns
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_ref().map(|_| i))
            .collect();
        match declared.as_slice() {
            [] => Mode::Filter,
            [column] => Mode::Single(*column),
            _ => Mode::Joint(declared),
        }
    }

    pub fn columns(&self) -> &[usize] {
        match self {
            Mode::Filter => &[],
            Mode::Single(column) => std::slice::from_ref(column),
            Mode::Joint(columns) => columns,
        }
    }
}

#[derive(Debug)]
pub struct ComputedConstraint {
    name: String,
    function: Arc<dyn Function>,
    arguments: Vec<Option<Term>>,
    returns: Vec<Option<Term>>,
    inputs: Vec<Variable>,
    outputs: Vec<Variable>,
    variables: Vec<Variable>,
    mode: Mode,
    argument_values: Vec<Option<Value>>,
    relation: Rows,
    seen: AHashSet<Vec<Value>>,
    proposal: Proposal,
}

impl ComputedConstraint {
    pub fn new(name: impl Into<String>, function: Arc<dyn Function>, call: &CallSite) -> Result<Self> {
        let slots = function.signature().resolve(call)?;
        let inputs = sorted_variables(&slots.arguments);
        let outputs = sorted_variables(&slots.returns);
        let mut variables: Vec<Variable> = inputs.iter().chain(&outputs).copied().collect();
        variables.sort_unstable();
        variables.dedup();
        let mode = Mode::from_returns(&slots.returns);
        let width = function.signature().output_width();
        Ok(Self {
            name: name.into(),
            function,
            argument_values: Vec::with_capacity(slots.arguments.len()),
            arguments: slots.arguments,
            returns: slots.returns,
            inputs,
            outputs,
            variables,
            mode,
            relation: Rows::new(width),
            seen: AHashSet::new(),
            proposal: Proposal::new(),
        })
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn function(&self) -> &Arc<dyn Function> {
        &self.function
    }

    /// Resolve the argument slots and evaluate the function into `out`.
    fn evaluate(
        &self,
        prefix: &Prefix,
        values: &mut Vec<Option<Value>>,
        out: &mut Rows,
    ) -> Result<Outcome> {
        values.clear();
        for term in &self.arguments {
            let value = match term {
                None => None,
                Some(term) => Some(prefix.resolve(term).cloned().ok_or_else(|| {
                    JoinError::protocol(&self.name, format!("input {term} is unbound"))
                })?),
            };
            values.push(value);
        }
        out.reset(self.function.signature().output_width());
        let signature = self.function.signature();
        let outcome = self.function.apply(&Arguments::new(signature, values), out)?;
        out.check_width(&self.name)?;
        Ok(outcome)
    }

    /// The consecutive run of unbound outputs starting at the frontier.
    fn requested_run(&self, depth: usize) -> Vec<Variable> {
        let mut run = Vec::new();
        for v in self.outputs.iter().copied().filter(|v| !v.is_bound_at(depth)) {
            if v.index() == depth + run.len() {
                run.push(v);
            } else {
                break;
            }
        }
        run
    }
}

/// Whether `row` agrees with every declared output already bound.
fn agrees_with_bound(mode: &Mode, returns: &[Option<Term>], row: &[Value], prefix: &Prefix) -> bool {
    mode.columns().iter().all(|&column| {
        let Some(term) = &returns[column] else {
            return true;
        };
        match prefix.resolve(term) {
            Some(bound) => row.get(column) == Some(bound),
            None => true,
        }
    })
}

fn sorted_variables(terms: &[Option<Term>]) -> Vec<Variable> {
    let mut vars: Vec<Variable> = terms
        .iter()
        .flatten()
        .filter_map(Term::variable)
        .collect();
    vars.sort_unstable();
    vars.dedup();
    vars
}

impl Constraint for ComputedConstraint {
    fn name(&self) -> &str {
        &self.name
    }

    fn variables(&self) -> &[Variable] {
        &self.variables
    }

    fn can_propose(&self, variable: Variable) -> bool {
        self.mode != Mode::Filter
            && self.outputs.binary_search(&variable).is_ok()
            && self.inputs.iter().all(|v| *v < variable)
    }

    fn test(&self, _index: &FactIndex, prefix: &Prefix) -> Result<bool> {
        let mut values = Vec::with_capacity(self.arguments.len());
        let mut relation = Rows::new(self.function.signature().output_width());
        if self.evaluate(prefix, &mut values, &mut relation)? == Outcome::Unrepresentable {
            return Ok(false);
        }
        let found = relation
            .iter()
            .any(|row| agrees_with_bound(&self.mode, &self.returns, row, prefix));
        Ok(found)
    }

    fn propose(
        &mut self,
        _index: &FactIndex,
        variable: Variable,
        prefix: &Prefix,
    ) -> Result<&Proposal> {
        let depth = prefix.depth();
        if variable != prefix.frontier() || !self.can_propose(variable) {
            return Err(JoinError::protocol(
                &self.name,
                format!("cannot propose {variable} at depth {depth}"),
            ));
        }
        let providing = self.requested_run(depth);

        let mut values = std::mem::take(&mut self.argument_values);
        let mut relation = std::mem::take(&mut self.relation);
        let outcome = self.evaluate(prefix, &mut values, &mut relation);
        self.argument_values = values;
        let outcome = outcome?;

        let candidates = self.proposal.begin(&providing, depth);
        self.seen.clear();
        if outcome == Outcome::Produced {
            'rows: for row in relation.iter() {
                if !agrees_with_bound(&self.mode, &self.returns, row, prefix) {
                    continue;
                }
                let mut projected: Vec<Option<Value>> = vec![None; providing.len()];
                for &column in self.mode.columns() {
                    let Some(Term::Var(v)) = &self.returns[column] else {
                        continue;
                    };
                    let Some(slot) = v.index().checked_sub(depth) else {
                        continue;
                    };
                    let Some(target) = projected.get_mut(slot) else {
                        continue;
                    };
                    match target.as_ref() {
                        Some(existing) if *existing != row[column] => continue 'rows,
                        Some(_) => {}
                        None => *target = Some(row[column].clone()),
                    }
                }
                let projected: Vec<Value> = projected.into_iter().flatten().collect();
                if projected.len() == providing.len() && self.seen.insert(projected.clone()) {
                    candidates.push_row(projected);
                }
            }
        }
        self.relation = relation;

        let proposal = self.proposal.seal();
        trace!(
            constraint = %self.name,
            %variable,
            width = providing.len(),
            cardinality = proposal.cardinality(),
            "computed proposal"
        );
        Ok(proposal)
    }

    fn resolve_proposal(&mut self, prefix: &Prefix) -> Result<&Rows> {
        self.proposal.resolve(&self.name, prefix.depth())
    }

    fn proposal(&self) -> &Proposal {
        &self.proposal
    }
}
