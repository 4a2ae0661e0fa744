//! Bounded plan mutations: split, add, delete, exit.
//!
//! Every operation is validated against the frontier and the width/depth
//! limits, applied to a copy of the tree, re-checked against the structural
//! and processed-prefix invariants, and only then committed. A rejected
//! operation leaves the caller's tree untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::core::id::SubtaskId;
use crate::core::immutability::check_processed_immutability;
use crate::core::invariants::validate_invariants;
use crate::core::types::PlanLimits;
use crate::tree::{PlanTree, SubtaskNode, SubtaskSpec, renumber};

/// Smallest number of children a split may create.
pub const MIN_SPLIT_CHILDREN: usize = 2;
/// Largest number of children a split may create.
pub const MAX_SPLIT_CHILDREN: usize = 4;

/// One proposed change to the plan tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MutationOp {
    /// Turn the leaf `target` into a parent of `subtasks`.
    Split {
        target: SubtaskId,
        subtasks: Vec<SubtaskSpec>,
    },
    /// Insert `subtasks` as siblings directly after `target`.
    Add {
        target: SubtaskId,
        subtasks: Vec<SubtaskSpec>,
    },
    /// Remove `target` and its subtree.
    Delete { target: SubtaskId },
    /// End the refinement round.
    Exit,
}

impl MutationOp {
    /// Split into `count` blank subtasks.
    pub fn split(target: SubtaskId, count: usize) -> Self {
        MutationOp::Split {
            target,
            subtasks: vec![SubtaskSpec::default(); count],
        }
    }

    /// Add `count` blank siblings.
    pub fn add(target: SubtaskId, count: usize) -> Self {
        MutationOp::Add {
            target,
            subtasks: vec![SubtaskSpec::default(); count],
        }
    }

    pub fn delete(target: SubtaskId) -> Self {
        MutationOp::Delete { target }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MutationOp::Split { .. } => "split",
            MutationOp::Add { .. } => "add",
            MutationOp::Delete { .. } => "delete",
            MutationOp::Exit => "exit",
        }
    }

    pub fn target(&self) -> Option<&SubtaskId> {
        match self {
            MutationOp::Split { target, .. }
            | MutationOp::Add { target, .. }
            | MutationOp::Delete { target } => Some(target),
            MutationOp::Exit => None,
        }
    }
}

/// A proposed operation that would violate a plan invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("target {0} does not exist")]
    TargetNotFound(SubtaskId),
    #[error("target {0} already has children")]
    TargetNotLeaf(SubtaskId),
    #[error("{op} of {target} requested {count} subtasks (allowed {min}..={max})")]
    InvalidChildCount {
        op: &'static str,
        target: SubtaskId,
        count: usize,
        min: usize,
        max: usize,
    },
    #[error("splitting {target} would create depth {depth} (max {max_depth})")]
    DepthExceeded {
        target: SubtaskId,
        depth: usize,
        max_depth: usize,
    },
    #[error("{target} would end up with {count} siblings (max width {max_width})")]
    WidthExceeded {
        target: SubtaskId,
        count: usize,
        max_width: usize,
    },
    #[error("target {target} is before frontier {frontier}")]
    TargetBeforeFrontier {
        target: SubtaskId,
        frontier: SubtaskId,
    },
    #[error("target {target} is the frontier {frontier} or one of its ancestors")]
    TargetIsFrontierOrAncestor {
        target: SubtaskId,
        frontier: SubtaskId,
    },
    #[error("target {0} contains completed work")]
    TargetAlreadyDone(SubtaskId),
    #[error("mutation would break plan invariants: {}", .0.join("; "))]
    InvariantViolated(Vec<String>),
    #[error("refinement round is closed")]
    RoundClosed,
}

impl MutationError {
    /// Stable name of the violated rule.
    pub fn reason(&self) -> &'static str {
        match self {
            MutationError::TargetNotFound(_) => "TargetNotFound",
            MutationError::TargetNotLeaf(_) => "TargetNotLeaf",
            MutationError::InvalidChildCount { .. } => "InvalidChildCount",
            MutationError::DepthExceeded { .. } => "DepthExceeded",
            MutationError::WidthExceeded { .. } => "WidthExceeded",
            MutationError::TargetBeforeFrontier { .. } => "TargetBeforeFrontier",
            MutationError::TargetIsFrontierOrAncestor { .. } => "TargetIsFrontierOrAncestor",
            MutationError::TargetAlreadyDone(_) => "TargetAlreadyDone",
            MutationError::InvariantViolated(_) => "InvariantViolated",
            MutationError::RoundClosed => "RoundClosed",
        }
    }
}

/// What an accepted operation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// New subtasks created, in id order.
    Created(Vec<SubtaskId>),
    /// Root of the removed subtree.
    Deleted(SubtaskId),
    Exit,
}

/// Validates and applies [`MutationOp`]s under fixed limits.
#[derive(Debug, Clone)]
pub struct PlanMutator {
    limits: PlanLimits,
    max_ops_per_round: usize,
}

impl PlanMutator {
    pub fn new(limits: PlanLimits, max_ops_per_round: usize) -> Self {
        Self {
            limits,
            max_ops_per_round,
        }
    }

    pub fn limits(&self) -> &PlanLimits {
        &self.limits
    }

    pub fn max_ops_per_round(&self) -> usize {
        self.max_ops_per_round
    }

    /// Apply one operation atomically.
    #[instrument(skip_all, fields(op = op.kind(), target = ?op.target().map(ToString::to_string)))]
    pub fn apply(&self, tree: &mut PlanTree, op: &MutationOp) -> Result<Applied, MutationError> {
        if let MutationOp::Exit = op {
            return Ok(Applied::Exit);
        }

        self.check_preconditions(tree, op)?;

        let mut next = tree.clone();
        let applied = match op {
            MutationOp::Split { target, subtasks } => split(&mut next, target, subtasks),
            MutationOp::Add { target, subtasks } => add(&mut next, target, subtasks),
            MutationOp::Delete { target } => delete(&mut next, target),
            MutationOp::Exit => Applied::Exit,
        };

        let mut errors = validate_invariants(&next, &self.limits);
        errors.extend(check_processed_immutability(tree, &next));
        if !errors.is_empty() {
            debug!(?errors, "post-mutation check failed");
            return Err(MutationError::InvariantViolated(errors));
        }

        *tree = next;
        info!(?applied, "mutation applied");
        Ok(applied)
    }

    fn check_preconditions(&self, tree: &PlanTree, op: &MutationOp) -> Result<(), MutationError> {
        let frontier = tree.frontier();
        match op {
            MutationOp::Split { target, subtasks } => {
                let node = tree
                    .get(target)
                    .ok_or_else(|| MutationError::TargetNotFound(target.clone()))?;
                if !node.is_leaf() {
                    return Err(MutationError::TargetNotLeaf(target.clone()));
                }
                let count = subtasks.len();
                if !(MIN_SPLIT_CHILDREN..=MAX_SPLIT_CHILDREN).contains(&count) {
                    return Err(MutationError::InvalidChildCount {
                        op: "split",
                        target: target.clone(),
                        count,
                        min: MIN_SPLIT_CHILDREN,
                        max: MAX_SPLIT_CHILDREN,
                    });
                }
                if count > self.limits.max_width {
                    return Err(MutationError::WidthExceeded {
                        target: target.clone(),
                        count,
                        max_width: self.limits.max_width,
                    });
                }
                let depth = target.depth() + 1;
                if depth > self.limits.max_depth {
                    return Err(MutationError::DepthExceeded {
                        target: target.clone(),
                        depth,
                        max_depth: self.limits.max_depth,
                    });
                }
                ensure_not_before_frontier(target, frontier)
            }
            MutationOp::Add { target, subtasks } => {
                if !tree.contains(target) {
                    return Err(MutationError::TargetNotFound(target.clone()));
                }
                ensure_not_before_frontier(target, frontier)?;
                let count = subtasks.len();
                if count == 0 {
                    return Err(MutationError::InvalidChildCount {
                        op: "add",
                        target: target.clone(),
                        count,
                        min: 1,
                        max: self.limits.max_width,
                    });
                }
                let siblings = tree.child_count(target.parent().as_ref()) + count;
                if siblings > self.limits.max_width {
                    return Err(MutationError::WidthExceeded {
                        target: target.clone(),
                        count: siblings,
                        max_width: self.limits.max_width,
                    });
                }
                Ok(())
            }
            MutationOp::Delete { target } => {
                let node = tree
                    .get(target)
                    .ok_or_else(|| MutationError::TargetNotFound(target.clone()))?;
                if target == frontier || target.is_ancestor_of(frontier) {
                    return Err(MutationError::TargetIsFrontierOrAncestor {
                        target: target.clone(),
                        frontier: frontier.clone(),
                    });
                }
                ensure_not_before_frontier(target, frontier)?;
                if node.any_done() {
                    return Err(MutationError::TargetAlreadyDone(target.clone()));
                }
                Ok(())
            }
            MutationOp::Exit => Ok(()),
        }
    }
}

fn ensure_not_before_frontier(target: &SubtaskId, frontier: &SubtaskId) -> Result<(), MutationError> {
    if target < frontier {
        return Err(MutationError::TargetBeforeFrontier {
            target: target.clone(),
            frontier: frontier.clone(),
        });
    }
    Ok(())
}

// The helpers below run on a scratch copy after preconditions passed, so
// lookups are expected to succeed; a miss leaves the copy unchanged and the
// post-mutation checks decide.

fn split(tree: &mut PlanTree, target: &SubtaskId, subtasks: &[SubtaskSpec]) -> Applied {
    let Some(node) = tree.get_mut(target) else {
        return Applied::Created(Vec::new());
    };
    node.children = subtasks
        .iter()
        .cloned()
        .zip(1u32..)
        .map(|(spec, position)| SubtaskNode::from_spec(target.child(position), spec))
        .collect();
    Applied::Created(node.children.iter().map(|child| child.id.clone()).collect())
}

fn add(tree: &mut PlanTree, target: &SubtaskId, subtasks: &[SubtaskSpec]) -> Applied {
    let parent = target.parent();
    let Some(siblings) = tree.children_mut(parent.as_ref()) else {
        return Applied::Created(Vec::new());
    };
    let insert_at = target.position() as usize;
    let new_nodes = subtasks
        .iter()
        .cloned()
        .map(|spec| SubtaskNode::from_spec(target.clone(), spec));
    siblings.splice(insert_at..insert_at, new_nodes);
    renumber(siblings, parent.as_ref());

    let created = (1..=subtasks.len())
        .map(|offset| target.with_position(target.position() + offset as u32))
        .collect();
    Applied::Created(created)
}

fn delete(tree: &mut PlanTree, target: &SubtaskId) -> Applied {
    let parent = target.parent();
    if let Some(siblings) = tree.children_mut(parent.as_ref()) {
        let index = target.position() as usize - 1;
        if index < siblings.len() {
            siblings.remove(index);
            renumber(siblings, parent.as_ref());
        }
    }
    Applied::Deleted(target.clone())
}
