//! Generic join: worst-case optimal, one variable (or one joint run of
//! variables) at a time.
//!
//! At depth `d` every constraint able to bind `?v{d}` proposes. A zero
//! cardinality abandons the branch; otherwise the smallest proposal (the
//! earliest constraint on ties) is resolved and its candidates are pushed
//! onto an explicit frame stack. Each candidate extends the prefix and is
//! semi-join filtered against every other testable constraint touching the
//! newly bound variables before the search descends.
//!
//! The frame stack keeps its candidate buffers between branches, so a run
//! allocates only while the stack is deeper than it has been before.

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::JoinConfig;
use crate::constraint::Constraint;
use crate::error::{JoinError, Result};
use crate::index::FactIndex;
use crate::prefix::Prefix;
use crate::value::{Value, Variable};

/// Counters for one [`GenericJoin::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinStats {
    pub results: usize,
    /// `propose` calls issued.
    pub proposals: usize,
    /// Candidate rows handed out by winning proposals.
    pub candidates: usize,
    /// Candidates dropped by semi-join filtering.
    pub rejected: usize,
    /// Branches cut by a zero-cardinality proposal.
    pub abandoned: usize,
    /// The run stopped early: the caller broke off, or the limit was hit
    /// with candidates still pending.
    pub truncated: bool,
}

#[derive(Debug, Default)]
struct Frame {
    depth: usize,
    width: usize,
    proposer: usize,
    rows: Vec<Value>,
    next: usize,
}

impl Frame {
    fn row_count(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.rows.len() / self.width
        }
    }

    fn has_pending(&self) -> bool {
        self.next < self.row_count()
    }
}

#[derive(Debug)]
pub struct GenericJoin {
    constraints: Vec<Box<dyn Constraint>>,
    variable_count: usize,
    config: JoinConfig,
    /// Per variable: constraints that can propose it, in compiled order.
    proposers: Vec<Vec<usize>>,
    /// Per variable: constraints that mention it, in compiled order.
    touching: Vec<Vec<usize>>,
    frames: Vec<Frame>,
    checks: Vec<usize>,
}

impl GenericJoin {
    pub fn new(
        constraints: Vec<Box<dyn Constraint>>,
        variable_count: usize,
        config: JoinConfig,
    ) -> Result<Self> {
        let mut proposers = vec![Vec::new(); variable_count];
        let mut touching = vec![Vec::new(); variable_count];

        for (ci, constraint) in constraints.iter().enumerate() {
            for &variable in constraint.variables() {
                let Some(list) = touching.get_mut(variable.index()) else {
                    return Err(JoinError::VariableOutOfRange {
                        variable,
                        count: variable_count,
                    });
                };
                list.push(ci);
                if constraint.can_propose(variable) {
                    proposers[variable.index()].push(ci);
                }
            }
        }

        for (position, list) in proposers.iter().enumerate() {
            if !list.is_empty() {
                continue;
            }
            let variable = Variable::new(position);
            if config.validate_plan {
                return Err(JoinError::NoProposer { variable });
            }
            warn!(%variable, "no constraint can bind variable; only joint proposals can reach it");
        }

        Ok(Self {
            constraints,
            variable_count,
            config,
            proposers,
            touching,
            frames: Vec::new(),
            checks: Vec::new(),
        })
    }

    pub fn constraints(&self) -> &[Box<dyn Constraint>] {
        &self.constraints
    }

    pub fn variable_count(&self) -> usize {
        self.variable_count
    }

    pub fn config(&self) -> &JoinConfig {
        &self.config
    }

    /// Evaluate the join, handing each full binding to `sink` in search
    /// order. `ControlFlow::Break` from the sink stops the run.
    pub fn run<F>(&mut self, index: &FactIndex, mut sink: F) -> Result<JoinStats>
    where
        F: FnMut(&[Value]) -> ControlFlow<()>,
    {
        let mut stats = JoinStats::default();
        let mut prefix = Prefix::with_capacity(self.variable_count);

        for constraint in &self.constraints {
            if constraint.variables().is_empty() && !constraint.test(index, &prefix)? {
                debug!(constraint = constraint.name(), "ground constraint fails; no results");
                return Ok(stats);
            }
        }

        if self.variable_count == 0 {
            if self.limit_reached(&stats) {
                stats.truncated = true;
            } else {
                stats.results = 1;
                stats.truncated = sink(&[]).is_break();
            }
            return Ok(stats);
        }

        let mut frames = std::mem::take(&mut self.frames);
        let outcome = self.search(index, &mut prefix, &mut frames, &mut stats, &mut sink);
        self.frames = frames;
        outcome?;

        debug!(
            results = stats.results,
            proposals = stats.proposals,
            candidates = stats.candidates,
            rejected = stats.rejected,
            abandoned = stats.abandoned,
            truncated = stats.truncated,
            "join finished"
        );
        Ok(stats)
    }

    /// Every result row, in search order.
    pub fn collect(&mut self, index: &FactIndex) -> Result<Vec<Vec<Value>>> {
        let mut rows = Vec::new();
        self.run(index, |row| {
            rows.push(row.to_vec());
            ControlFlow::Continue(())
        })?;
        Ok(rows)
    }

    fn limit_reached(&self, stats: &JoinStats) -> bool {
        self.config.limit.is_some_and(|limit| stats.results >= limit)
    }

    fn search<F>(
        &mut self,
        index: &FactIndex,
        prefix: &mut Prefix,
        frames: &mut Vec<Frame>,
        stats: &mut JoinStats,
        sink: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&[Value]) -> ControlFlow<()>,
    {
        if self.limit_reached(stats) {
            stats.truncated = true;
            return Ok(());
        }

        let mut active = 0usize;
        if self.open_frame(index, prefix, frames, active, stats)? {
            active += 1;
        }

        while active > 0 {
            let (depth, width, proposer) = {
                let frame = &mut frames[active - 1];
                if !frame.has_pending() {
                    prefix.truncate(frame.depth);
                    active -= 1;
                    continue;
                }
                let start = frame.next * frame.width;
                frame.next += 1;
                prefix.truncate(frame.depth);
                for value in &frame.rows[start..start + frame.width] {
                    prefix.push(value.clone());
                }
                (frame.depth, frame.width, frame.proposer)
            };

            if !self.filter(index, prefix, depth, width, proposer)? {
                stats.rejected += 1;
                continue;
            }

            if prefix.depth() == self.variable_count {
                stats.results += 1;
                if sink(prefix.values()).is_break() {
                    debug!(results = stats.results, "join cancelled by caller");
                    stats.truncated = true;
                    return Ok(());
                }
                if self.limit_reached(stats) {
                    stats.truncated = frames[..active].iter().any(Frame::has_pending);
                    debug!(limit = ?self.config.limit, truncated = stats.truncated, "result limit reached");
                    return Ok(());
                }
                continue;
            }

            if self.open_frame(index, prefix, frames, active, stats)? {
                active += 1;
            }
        }
        Ok(())
    }

    /// Propose for the frontier, resolve the winner into `frames[slot]`.
    /// Returns `false` when the branch is abandoned.
    fn open_frame(
        &mut self,
        index: &FactIndex,
        prefix: &Prefix,
        frames: &mut Vec<Frame>,
        slot: usize,
        stats: &mut JoinStats,
    ) -> Result<bool> {
        let depth = prefix.depth();
        let variable = prefix.frontier();

        let mut best: Option<(usize, usize)> = None;
        for &ci in &self.proposers[depth] {
            let constraint = &mut self.constraints[ci];
            let cardinality = constraint.propose(index, variable, prefix)?.cardinality();
            stats.proposals += 1;
            if cardinality == 0 {
                trace!(constraint = constraint.name(), %variable, "empty proposal; abandoning branch");
                stats.abandoned += 1;
                return Ok(false);
            }
            if best.map_or(true, |(_, smallest)| cardinality < smallest) {
                best = Some((ci, cardinality));
            }
        }
        let Some((winner, cardinality)) = best else {
            stats.abandoned += 1;
            return Ok(false);
        };

        let constraint = &mut self.constraints[winner];
        let width = checked_width(&**constraint, variable, self.variable_count)?;
        debug!(
            constraint = constraint.name(),
            %variable,
            width,
            cardinality,
            "selected proposer"
        );

        if frames.len() == slot {
            frames.push(Frame::default());
        }
        let frame = &mut frames[slot];
        let rows = constraint.resolve_proposal(prefix)?;
        let (resolved, resolved_width) = (rows.len(), rows.width());
        frame.rows.clear();
        frame.rows.extend_from_slice(rows.values());
        frame.depth = depth;
        frame.width = width;
        frame.proposer = winner;
        frame.next = 0;

        if resolved != cardinality || resolved_width != width {
            return Err(JoinError::protocol(
                constraint.name(),
                format!(
                    "resolved {resolved} rows of width {resolved_width}, proposed {cardinality} of width {width}"
                ),
            ));
        }
        stats.candidates += resolved;
        Ok(true)
    }

    /// Semi-join filter for variables `depth..depth + width`, skipping the
    /// constraint that proposed them.
    fn filter(
        &mut self,
        index: &FactIndex,
        prefix: &Prefix,
        depth: usize,
        width: usize,
        proposer: usize,
    ) -> Result<bool> {
        let bound = depth + width;
        let mut checks = std::mem::take(&mut self.checks);
        checks.clear();
        for touching in &self.touching[depth..bound] {
            checks.extend(touching.iter().copied().filter(|&ci| ci != proposer));
        }
        if width > 1 {
            checks.sort_unstable();
            checks.dedup();
        }

        let mut accepted = true;
        for &ci in &checks {
            let constraint = &self.constraints[ci];
            if !constraint.is_testable(bound) {
                continue;
            }
            match constraint.test(index, prefix) {
                Ok(true) => {}
                Ok(false) => {
                    trace!(constraint = constraint.name(), depth = bound, "candidate rejected");
                    accepted = false;
                    break;
                }
                Err(err) => {
                    self.checks = checks;
                    return Err(err);
                }
            }
        }
        self.checks = checks;
        Ok(accepted)
    }
}

/// Width of the winner's proposal: a consecutive run of variables starting at
/// the frontier and inside the query.
fn checked_width(constraint: &dyn Constraint, frontier: Variable, count: usize) -> Result<usize> {
    let providing = constraint.proposal().providing();
    let consecutive = providing
        .iter()
        .enumerate()
        .all(|(offset, v)| v.index() == frontier.index() + offset);
    if providing.is_empty() || !consecutive || frontier.index() + providing.len() > count {
        let listed: Vec<String> = providing.iter().map(ToString::to_string).collect();
        return Err(JoinError::protocol(
            constraint.name(),
            format!("proposal for {frontier} provides [{}]", listed.join(", ")),
        ));
    }
    Ok(providing.len())
}
