//! Fact-pattern constraints: `(entity, attribute, value)` matched against
//! the [`FactIndex`].
//!
//! A pattern can propose any of its variables, whatever else is bound: the
//! candidates are the distinct values at that variable's position among the
//! facts that agree with every bound position. `test` works on partial
//! prefixes too, so the driver intersects a pattern for every variable it
//! touches, not just the last one.

use roaring::RoaringBitmap;
use tracing::trace;

use crate::constraint::Constraint;
use crate::error::{JoinError, Result};
use crate::index::{FactIndex, Position, ValueId};
use crate::prefix::Prefix;
use crate::proposal::{Proposal, Rows};
use crate::value::{Term, Variable};

#[derive(Debug)]
pub struct FactPattern {
    name: String,
    terms: [Term; 3],
    variables: Vec<Variable>,
    /// Whether some variable occupies more than one position.
    repeats: bool,
    proposal: Proposal,
}

impl FactPattern {
    pub fn new(entity: impl Into<Term>, attribute: impl Into<Term>, value: impl Into<Term>) -> Self {
        let terms = [entity.into(), attribute.into(), value.into()];
        let name = format!("fact({}, {}, {})", terms[0], terms[1], terms[2]);
        let mentioned: Vec<Variable> = terms.iter().filter_map(Term::variable).collect();
        let mut variables = mentioned.clone();
        variables.sort_unstable();
        variables.dedup();
        let repeats = variables.len() != mentioned.len();
        Self {
            name,
            terms,
            variables,
            repeats,
            proposal: Proposal::new(),
        }
    }

    pub fn terms(&self) -> &[Term; 3] {
        &self.terms
    }

    /// Interned ids of every bound position, or `None` if some bound value
    /// never occurs in the index (no fact can match).
    fn bound_ids(&self, index: &FactIndex, prefix: &Prefix) -> Option<Vec<(Position, ValueId)>> {
        let mut bound = Vec::with_capacity(3);
        for (position, term) in Position::ALL.into_iter().zip(&self.terms) {
            if let Some(value) = prefix.resolve(term) {
                bound.push((position, index.id_of(value)?));
            }
        }
        Some(bound)
    }

    /// Positions that hold the same unbound variable must agree.
    fn consistent(&self, fact: &[ValueId; 3], depth: usize) -> bool {
        if !self.repeats {
            return true;
        }
        for i in 0..3 {
            let Term::Var(v) = &self.terms[i] else {
                continue;
            };
            if v.is_bound_at(depth) {
                continue;
            }
            for j in (i + 1)..3 {
                if self.terms[j] == self.terms[i] && fact[j] != fact[i] {
                    return false;
                }
            }
        }
        true
    }

    fn candidate_ids(
        &self,
        index: &FactIndex,
        matches: &RoaringBitmap,
        column: usize,
        depth: usize,
    ) -> RoaringBitmap {
        let mut ids = RoaringBitmap::new();
        for fact_id in matches {
            let Some(fact) = index.fact(fact_id) else {
                continue;
            };
            if self.consistent(&fact, depth) {
                ids.insert(fact[column]);
            }
        }
        ids
    }
}

impl Constraint for FactPattern {
    fn name(&self) -> &str {
        &self.name
    }

    fn variables(&self) -> &[Variable] {
        &self.variables
    }

    fn can_propose(&self, variable: Variable) -> bool {
        self.references(variable)
    }

    fn is_testable(&self, _depth: usize) -> bool {
        true
    }

    fn test(&self, index: &FactIndex, prefix: &Prefix) -> Result<bool> {
        let Some(bound) = self.bound_ids(index, prefix) else {
            return Ok(false);
        };
        let matches = index.matching(&bound);
        if !self.repeats {
            return Ok(!matches.is_empty());
        }
        let depth = prefix.depth();
        Ok(matches
            .iter()
            .filter_map(|id| index.fact(id))
            .any(|fact| self.consistent(&fact, depth)))
    }

    fn propose(
        &mut self,
        index: &FactIndex,
        variable: Variable,
        prefix: &Prefix,
    ) -> Result<&Proposal> {
        let depth = prefix.depth();
        if variable != prefix.frontier() {
            return Err(JoinError::protocol(
                &self.name,
                format!("asked to propose {variable} at depth {depth}"),
            ));
        }
        let Some(column) = self
            .terms
            .iter()
            .position(|t| t.variable() == Some(variable))
        else {
            return Err(JoinError::protocol(
                &self.name,
                format!("{variable} is not mentioned"),
            ));
        };

        let ids = match self.bound_ids(index, prefix) {
            Some(bound) => {
                let matches = index.matching(&bound);
                self.candidate_ids(index, &matches, column, depth)
            }
            None => RoaringBitmap::new(),
        };

        let candidates = self.proposal.begin(&[variable], depth);
        for id in &ids {
            if let Some(value) = index.value_of(id) {
                candidates.push(value);
            }
        }
        let proposal = self.proposal.seal();
        trace!(
            constraint = %self.name,
            %variable,
            cardinality = proposal.cardinality(),
            "fact pattern proposal"
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
