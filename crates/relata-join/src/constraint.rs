//! The constraint contract shared by fact patterns and computed relations.
//!
//! A constraint is asked three things by the driver:
//!
//! - `propose`: for the frontier variable, how many candidates could you
//!   contribute? The answer (and any materialized candidates) is stored in
//!   the constraint's own [`Proposal`].
//! - `resolve_proposal`: hand over the candidates of the proposal you just
//!   made, for the same prefix.
//! - `test`: is this (possibly over-complete) prefix consistent with you?
//!
//! Constraints are not reentrant: one proposal is in flight per instance.

use std::fmt;

use crate::error::Result;
use crate::index::FactIndex;
use crate::prefix::Prefix;
use crate::proposal::{Proposal, Rows};
use crate::value::Variable;

pub trait Constraint: fmt::Debug + Send {
    /// Name for diagnostics and fault messages.
    fn name(&self) -> &str;

    /// Every variable this constraint mentions, sorted and deduplicated.
    fn variables(&self) -> &[Variable];

    fn references(&self, variable: Variable) -> bool {
        self.variables().binary_search(&variable).is_ok()
    }

    /// Whether this constraint can bind `variable` once every variable
    /// before it in the global order is bound.
    fn can_propose(&self, variable: Variable) -> bool;

    /// Whether `test` can judge a prefix of this depth. By default a
    /// constraint needs all of its variables bound.
    fn is_testable(&self, depth: usize) -> bool {
        self.variables().iter().all(|v| v.is_bound_at(depth))
    }

    /// Consistency of the bound values with this constraint. Bindings the
    /// constraint does not mention are ignored.
    fn test(&self, index: &FactIndex, prefix: &Prefix) -> Result<bool>;

    /// Estimate (and possibly materialize) the candidates for `variable`,
    /// which must be the prefix frontier.
    fn propose(&mut self, index: &FactIndex, variable: Variable, prefix: &Prefix)
        -> Result<&Proposal>;

    /// The candidates of the proposal made against this same prefix.
    fn resolve_proposal(&mut self, prefix: &Prefix) -> Result<&Rows>;

    /// The most recent proposal.
    fn proposal(&self) -> &Proposal;
}
