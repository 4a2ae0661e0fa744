//! Refinement rounds: a bounded sequence of mutations against one plan.
//!
//! A round borrows the plan mutably for its whole lifetime, so only one
//! refinement session can touch a given tree at a time.

use tracing::{info, warn};

use crate::core::mutation::{Applied, MutationError, MutationOp, PlanMutator};
use crate::tree::PlanTree;

/// Lifecycle of a refinement round.
///
/// `Idle → Proposing → Validating → {Applied → Proposing | Rejected}`;
/// an explicit or implicit exit moves to `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    Proposing,
    Validating,
    Applied,
    Rejected,
    Done,
}

/// Result of one accepted proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundStep {
    /// The operation was applied; `remaining` proposals are left in the budget.
    Applied { applied: Applied, remaining: usize },
    /// The round finished, either by request or because the budget ran out.
    Exited { implicit: bool },
}

pub struct RefinementRound<'a> {
    mutator: &'a PlanMutator,
    tree: &'a mut PlanTree,
    state: RoundState,
    accepted: usize,
}

impl<'a> RefinementRound<'a> {
    pub fn new(mutator: &'a PlanMutator, tree: &'a mut PlanTree) -> Self {
        Self {
            mutator,
            tree,
            state: RoundState::Idle,
            accepted: 0,
        }
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    /// Number of operations accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn remaining(&self) -> usize {
        self.mutator.max_ops_per_round().saturating_sub(self.accepted)
    }

    pub fn mutator(&self) -> &PlanMutator {
        self.mutator
    }

    pub fn tree(&self) -> &PlanTree {
        &*self.tree
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, RoundState::Done | RoundState::Rejected)
    }

    /// Submit the next proposal.
    ///
    /// Once the budget is spent, any proposal is treated as `Exit`. A rejected
    /// proposal halts the round; operations accepted earlier stay applied.
    pub fn propose(&mut self, op: &MutationOp) -> Result<RoundStep, MutationError> {
        if self.is_closed() {
            return Err(MutationError::RoundClosed);
        }
        self.state = RoundState::Proposing;

        if self.remaining() == 0 {
            if !matches!(op, MutationOp::Exit) {
                info!(
                    op = op.kind(),
                    budget = self.mutator.max_ops_per_round(),
                    "mutation budget spent, treating proposal as exit"
                );
            }
            self.state = RoundState::Done;
            return Ok(RoundStep::Exited { implicit: true });
        }

        if let MutationOp::Exit = op {
            self.state = RoundState::Done;
            return Ok(RoundStep::Exited { implicit: false });
        }

        self.state = RoundState::Validating;
        match self.mutator.apply(&mut *self.tree, op) {
            Ok(applied) => {
                self.accepted += 1;
                self.state = RoundState::Applied;
                Ok(RoundStep::Applied {
                    applied,
                    remaining: self.remaining(),
                })
            }
            Err(err) => {
                warn!(op = op.kind(), reason = err.reason(), %err, "mutation rejected");
                self.state = RoundState::Rejected;
                Err(err)
            }
        }
    }
}
