//! Processed-prefix immutability checks.

use std::collections::HashMap;

use crate::core::id::SubtaskId;
use crate::tree::{PlanTree, SubtaskNode};

/// Validate that nothing at or before the frontier of `prev` changed in `next`.
///
/// For each subtask of `prev` processed no later than the frontier:
/// - It still exists in `next` under the same id.
/// - Its own fields (everything except `children`) are unchanged.
///
/// Additionally, `next` must not contain a subtask placed before the frontier
/// that `prev` did not have, and the frontier itself must not move.
///
/// Returns a list of stable error messages (in processing order).
pub fn check_processed_immutability(prev: &PlanTree, next: &PlanTree) -> Vec<String> {
    let frontier = prev.frontier();
    let mut errors = Vec::new();

    if next.frontier() != frontier {
        errors.push(format!(
            "frontier moved from {} to {}",
            frontier,
            next.frontier()
        ));
    }

    let next_index: HashMap<&SubtaskId, &SubtaskNode> =
        next.iter().map(|node| (&node.id, node)).collect();

    for node in prev.iter().filter(|node| &node.id <= frontier) {
        match next_index.get(&node.id) {
            None => errors.push(format!("processed subtask {} missing in next plan", node.id)),
            Some(other) if !same_fields(node, other) => {
                errors.push(format!("processed subtask {} changed in next plan", node.id));
            }
            Some(_) => {}
        }
    }

    for node in next.iter().filter(|node| &node.id < frontier) {
        if !prev.contains(&node.id) {
            errors.push(format!("subtask {} inserted before frontier {}", node.id, frontier));
        }
    }

    errors
}

fn same_fields(a: &SubtaskNode, b: &SubtaskNode) -> bool {
    a.name == b.name
        && a.goal == b.goal
        && a.criticism == b.criticism
        && a.milestones == b.milestones
        && a.status == b.status
}
