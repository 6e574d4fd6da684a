//! Proposals: a constraint's report of how it would extend the prefix.
//!
//! Every constraint owns exactly one [`Proposal`] and overwrites it on each
//! `propose` call. The driver reads the cardinality, and resolves at most the
//! winning proposal before proposing against that constraint again. The state
//! machine here rejects a resolve that does not follow a matching propose.

use crate::error::{JoinError, Result};
use crate::value::{Value, Variable};

// ============================================================================
// Rows
// ============================================================================

/// A row-major buffer of fixed-width tuples. Cleared, never shrunk, so one
/// buffer serves every call.
///
/// A pushed row of the wrong width is dropped and remembered; owners check
/// [`Rows::check_width`] before trusting the buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    width: usize,
    rows: usize,
    values: Vec<Value>,
    misshapen: Option<usize>,
}

impl Rows {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            rows: 0,
            values: Vec::new(),
            misshapen: None,
        }
    }

    /// Empty the buffer and switch it to `width`-wide rows.
    pub fn reset(&mut self, width: usize) {
        self.width = width;
        self.rows = 0;
        self.values.clear();
        self.misshapen = None;
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn push_row(&mut self, row: impl IntoIterator<Item = Value>) {
        let before = self.values.len();
        self.values.extend(row);
        let pushed = self.values.len() - before;
        if pushed != self.width {
            self.values.truncate(before);
            self.misshapen.get_or_insert(pushed);
            return;
        }
        self.rows += 1;
    }

    /// Fails if any row pushed since the last reset had the wrong width.
    pub fn check_width(&self, owner: &str) -> Result<()> {
        match self.misshapen {
            None => Ok(()),
            Some(pushed) => Err(JoinError::protocol(
                owner,
                format!("pushed a row of width {pushed} into rows of width {}", self.width),
            )),
        }
    }

    /// Push a one-column row.
    pub fn push(&mut self, value: Value) {
        self.push_row(std::iter::once(value));
    }

    pub fn row(&self, i: usize) -> &[Value] {
        &self.values[i * self.width..(i + 1) * self.width]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[Value]> + '_ {
        (0..self.rows).map(move |i| self.row(i))
    }

    pub fn contains(&self, row: &[Value]) -> bool {
        self.iter().any(|r| r == row)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn to_vecs(&self) -> Vec<Vec<Value>> {
        self.iter().map(<[Value]>::to_vec).collect()
    }
}

// ============================================================================
// Proposal
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProposalState {
    /// Never proposed, or already resolved.
    #[default]
    Idle,
    /// Proposed against a prefix of this depth; may be resolved once.
    Proposed { depth: usize },
}

#[derive(Debug, Default)]
pub struct Proposal {
    providing: Vec<Variable>,
    cardinality: usize,
    candidates: Rows,
    state: ProposalState,
}

impl Proposal {
    pub fn new() -> Self {
        Self::default()
    }

    /// The variables this proposal would bind, in variable order.
    pub fn providing(&self) -> &[Variable] {
        &self.providing
    }

    /// Candidate count; `0` means the branch cannot be extended.
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    pub fn state(&self) -> ProposalState {
        self.state
    }

    pub fn candidates(&self) -> &Rows {
        &self.candidates
    }

    /// Start a fresh proposal for `providing` against a prefix of `depth`.
    pub fn begin(&mut self, providing: &[Variable], depth: usize) -> &mut Rows {
        self.providing.clear();
        self.providing.extend_from_slice(providing);
        self.cardinality = 0;
        self.candidates.reset(providing.len());
        self.state = ProposalState::Proposed { depth };
        &mut self.candidates
    }

    /// Record the materialized candidates as the exact cardinality.
    pub fn seal(&mut self) -> &Proposal {
        self.cardinality = self.candidates.len();
        self
    }

    /// Hand out the candidates stashed by the matching `propose`.
    pub fn resolve(&mut self, owner: &str, depth: usize) -> Result<&Rows> {
        match self.state {
            ProposalState::Idle => Err(JoinError::protocol(
                owner,
                "resolve without a preceding propose",
            )),
            ProposalState::Proposed { depth: proposed } if proposed != depth => {
                Err(JoinError::protocol(
                    owner,
                    format!("proposal made at depth {proposed} resolved at depth {depth}"),
                ))
            }
            ProposalState::Proposed { .. } if self.cardinality == 0 => Err(JoinError::protocol(
                owner,
                "resolve of a zero-cardinality proposal",
            )),
            ProposalState::Proposed { .. } => {
                self.state = ProposalState::Idle;
                Ok(&self.candidates)
            }
        }
    }
}
